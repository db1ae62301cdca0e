//! Startup and synchronisation paths.
//!
//! Before the workers drive live traffic, the node reloads its saved
//! transactions, validates the durable index chain from genesis and rebuilds
//! the in-memory counters. Transactions fetched from peers while catching up
//! enter through the "missing" paths, which reuse the live sequencing logic.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::Ordering;

use concord_store::StoreError;
use concord_types::{BalanceState, Transaction, TransactionIndexEntry, TxHash};

use crate::index_chain::IndexChain;
use crate::reconciliation::{ConfirmationEngine, FollowUp};
use crate::tracing_spans;
use crate::EngineError;

impl ConfirmationEngine {
    /// Reload one persisted transaction.
    ///
    /// Reserved effects are re-applied to the pre-balance and trust-chain
    /// consensus is counted. `max_index` is widened only by durably indexed
    /// transactions; results that were never indexed, and blocked
    /// transactions, are resumed after [`ConfirmationEngine::validate_chain_from_genesis`].
    ///
    /// Fails with [`EngineError::AlreadyValidated`] once the engine is ready.
    pub fn insert_saved_transaction(
        &self,
        tx: Transaction,
        max_index: &mut Option<u64>,
    ) -> Result<(), EngineError> {
        if self.is_ready() {
            return Err(EngineError::AlreadyValidated);
        }
        if tx.is_valid() {
            for transfer in &tx.base_transfers {
                self.ledger
                    .update_pre_balance(&transfer.address, transfer.amount);
            }
        }
        if tx.has_trust_chain_consensus() {
            self.counters.inc_trust_chain_confirmed();
        }

        match (&tx.dsp_result, tx.indexed) {
            (Some(result), true) => {
                *max_index = (*max_index).max(Some(result.index));
                if tx.balance == BalanceState::Blocked && result.is_confirmed() {
                    self.recovered.lock().reevaluations.push(tx.hash);
                }
            }
            (Some(result), false) => {
                self.recovered.lock().replays.push((result.index, tx.hash));
            }
            (None, _) => {}
        }
        if !tx.indexed {
            self.unindexed.insert(tx.hash);
        }

        self.transactions.put(&tx)
    }

    /// Store a transaction fetched from a peer and sequence its DSP result.
    ///
    /// Its remote balance state is reinterpreted locally: effects the peer
    /// held as reserved or applied are reserved here and applied on
    /// finalisation.
    ///
    /// Fails with [`EngineError::NotReady`] until the chain is validated.
    pub fn insert_missing_transaction(&self, mut tx: Transaction) -> Result<(), EngineError> {
        if !self.is_ready() {
            return Err(EngineError::NotReady);
        }
        let hash = tx.hash;
        tx.indexed = false;
        if tx.is_valid() {
            tx.balance = BalanceState::Reserved;
            for transfer in &tx.base_transfers {
                self.ledger
                    .update_pre_balance(&transfer.address, transfer.amount);
            }
        } else {
            tx.balance = BalanceState::Unreserved;
        }
        if tx.has_trust_chain_consensus() {
            self.counters.inc_trust_chain_confirmed();
        }
        self.unindexed.insert(hash);
        self.transactions.put(&tx)?;
        tracing::debug!(%hash, "missing transaction inserted");

        self.drive(|work| {
            work.push_back(FollowUp::Replay(hash));
            Ok(())
        })
    }

    /// Merge consensus signals fetched from a peer into a known transaction.
    ///
    /// Trust-chain consensus is counted only when `unconfirmed` lists the hash
    /// as not yet trust-chain-confirmed locally. An unknown hash is inserted
    /// as a missing transaction. Fails with [`EngineError::NotReady`] until
    /// the chain is validated.
    pub fn insert_missing_confirmation(
        &self,
        tx: Transaction,
        unconfirmed: &HashSet<TxHash>,
    ) -> Result<(), EngineError> {
        if !self.is_ready() {
            return Err(EngineError::NotReady);
        }
        let hash = tx.hash;
        if !self.transactions.exists(&hash)? {
            return self.insert_missing_transaction(tx);
        }

        self.transactions.lock_and_mutate(&hash, |local| {
            if local.trust_chain.is_none() && tx.trust_chain.is_some() {
                local.trust_chain = tx.trust_chain.clone();
                if unconfirmed.contains(&hash) {
                    self.counters.inc_trust_chain_confirmed();
                }
            }
            if local.dsp_result.is_none() {
                local.dsp_result = tx.dsp_result.clone();
            }
            Ok(())
        })?;
        tracing::debug!(%hash, "missing confirmation merged");

        self.drive(|work| {
            work.push_back(FollowUp::Replay(hash));
            Ok(())
        })
    }

    /// Walk the durable index chain from index 0 through `max_index`,
    /// recomputing every accumulated hash, then mark the engine ready.
    ///
    /// Final balances are rebuilt only from transactions that reached
    /// [`BalanceState::Applied`] with trust-chain consensus; a reserved
    /// transaction that has both signals is finalised by the resumed work
    /// instead.
    ///
    /// Fails with [`EngineError::Integrity`] on the first missing entry,
    /// missing transaction, missing DSP result or hash mismatch; the engine
    /// then stays not ready. On success the work collected by
    /// [`ConfirmationEngine::insert_saved_transaction`] is resumed.
    pub fn validate_chain_from_genesis(&self, max_index: Option<u64>) -> Result<(), EngineError> {
        let _span = tracing_spans::chain_validation_span(max_index).entered();
        let mut accumulated = concord_crypto::genesis_accumulated_hash();
        let mut last: Option<TransactionIndexEntry> = None;

        for index in max_index.map_or(0..0, |max| 0..max + 1) {
            let last_good_index = last.as_ref().map(|e| e.index);
            let integrity = |reason: String| EngineError::Integrity {
                last_good_index,
                reason,
            };

            let entry = match self.chain.entry(index) {
                Ok(entry) => entry,
                Err(StoreError::NotFound(_)) => {
                    return Err(integrity(format!("missing index entry {index}")))
                }
                Err(e) => return Err(e.into()),
            };
            let tx = match self.transactions.get(&entry.tx_hash) {
                Ok(tx) => tx,
                Err(EngineError::UnknownTransaction(hash)) => {
                    return Err(integrity(format!("missing transaction {hash} at index {index}")))
                }
                Err(e) => return Err(e),
            };
            let Some(result) = tx.dsp_result.as_ref() else {
                return Err(integrity(format!(
                    "transaction {} at index {index} has no DSP result",
                    tx.hash
                )));
            };
            if result.index != index {
                return Err(integrity(format!(
                    "transaction {} claims index {} but is stored at {index}",
                    tx.hash, result.index
                )));
            }

            let expected = IndexChain::accumulated_hash(&accumulated, &entry.tx_hash, index);
            if expected != entry.accumulated_hash {
                return Err(integrity(format!("accumulated hash mismatch at index {index}")));
            }
            accumulated = expected;

            if !tx.indexed {
                // The entry was written but the record never caught up.
                self.transactions.lock_and_mutate(&tx.hash, |tx| {
                    tx.indexed = true;
                    Ok(())
                })?;
                self.unindexed.remove(&tx.hash);
            }

            if result.is_confirmed() {
                // Blocked results are counted when re-evaluation admits them.
                if tx.is_valid() {
                    self.counters.inc_dsp_confirmed();
                }
                if tx.has_trust_chain_consensus() && tx.balance == BalanceState::Applied {
                    for transfer in &tx.base_transfers {
                        self.ledger.update_balance(&transfer.address, transfer.amount);
                    }
                    self.counters.inc_total_confirmed();
                    self.metrics.confirmed.inc();
                }
            } else {
                self.counters.inc_dsp_rejected();
                self.metrics.dsp_rejected.inc();
            }
            last = Some(entry);
        }

        let last_index = last.as_ref().map(|e| e.index);
        self.chain.set_checkpoint(last);
        self.metrics
            .last_index
            .set(last_index.map_or(-1, |i| i as i64));
        self.ready.store(true, Ordering::Release);
        tracing::info!(?last_index, "index chain validated");

        self.resume_recovered();
        Ok(())
    }

    /// Re-sequence saved results in index order, then retry blocked admissions.
    fn resume_recovered(&self) {
        let recovered = std::mem::take(&mut *self.recovered.lock());
        let mut replays = recovered.replays;
        replays.sort_unstable();

        let mut work: VecDeque<FollowUp> = replays
            .into_iter()
            .map(|(_, hash)| FollowUp::Replay(hash))
            .collect();
        work.extend(
            recovered
                .reevaluations
                .into_iter()
                .map(FollowUp::Reevaluate),
        );
        if !work.is_empty() {
            tracing::info!(pending = work.len(), "resuming recovered transactions");
        }
        self.run_follow_ups(work);
    }
}
