//! Reconciliation state machine.
//!
//! Every transaction receives two independent consensus signals: trust-chain
//! consensus (TCC) and a DSP result carrying a global index. The engine:
//!
//! 1. Sequences DSP results into the durable index chain strictly in index
//!    order, parking early arrivals in the [`SequenceBuffer`].
//! 2. Once a DSP-confirmed result is indexed, reserves the transaction's
//!    balance effects through the [`AdmissionController`], or parks it as
//!    blocked.
//! 3. On a DSP rejection, rolls back any reservation and re-evaluates the
//!    transactions that were blocked on the freed addresses.
//! 4. Finalises a transaction once both signals are present and its effects
//!    are reserved.
//!
//! Replays of buffered successors and cascade re-evaluations are queued as
//! [`FollowUp`] work and run after the triggering transaction's lock is
//! released, so a worker never holds two transaction locks at once.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use concord_types::{
    Address, BalanceState, DspConsensusResult, Timestamp, Transaction, TransactionStatus,
    TrustChainConsensus, TxHash,
};
use dashmap::DashSet;
use parking_lot::Mutex;

use crate::admission::{AdmissionController, AdmissionOutcome};
use crate::balance::BalanceLedger;
use crate::counters::{CountersSnapshot, EngineCounters};
use crate::dependency_index::DependencyIndex;
use crate::event::ConsensusEvent;
use crate::hooks::ConfirmationHooks;
use crate::index_chain::{IndexChain, InsertOutcome, SharedIndexStore};
use crate::metrics::EngineMetrics;
use crate::sequence_buffer::{BufferInsert, SequenceBuffer};
use crate::tracing_spans;
use crate::transactions::{SharedTransactionStore, TransactionTable};
use crate::EngineError;

/// Work deferred until the current transaction's lock is released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FollowUp {
    /// A buffered DSP result whose predecessor index just became durable.
    Replay(TxHash),
    /// A blocked transaction whose input address just had balance freed.
    Reevaluate(TxHash),
}

/// Outcome of observing a new transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Observed {
    /// Stored with its effects reserved against the pre-balance.
    Reserved,
    /// Stored without a reservation; admission is retried once indexed.
    Unreserved,
    /// The hash was already known; nothing changed.
    Duplicate,
}

/// Work collected by the recovery paths, resumed after chain validation.
#[derive(Default)]
pub(crate) struct RecoveredWork {
    pub(crate) replays: Vec<(u64, TxHash)>,
    pub(crate) reevaluations: Vec<TxHash>,
}

pub struct ConfirmationEngine {
    pub(crate) transactions: TransactionTable,
    pub(crate) chain: IndexChain,
    pub(crate) sequence_buffer: SequenceBuffer,
    pub(crate) dependencies: Arc<DependencyIndex>,
    pub(crate) admission: AdmissionController,
    pub(crate) ledger: Arc<dyn BalanceLedger>,
    pub(crate) hooks: ConfirmationHooks,
    pub(crate) counters: EngineCounters,
    pub(crate) metrics: Arc<EngineMetrics>,
    /// Observed transactions whose DSP result is not yet durably indexed.
    pub(crate) unindexed: DashSet<TxHash>,
    pub(crate) ready: AtomicBool,
    pub(crate) recovered: Mutex<RecoveredWork>,
}

impl ConfirmationEngine {
    pub fn new(
        transactions: SharedTransactionStore,
        index: SharedIndexStore,
        ledger: Arc<dyn BalanceLedger>,
        hooks: ConfirmationHooks,
    ) -> Self {
        Self::with_metrics(transactions, index, ledger, hooks, Arc::new(EngineMetrics::new()))
    }

    pub fn with_metrics(
        transactions: SharedTransactionStore,
        index: SharedIndexStore,
        ledger: Arc<dyn BalanceLedger>,
        hooks: ConfirmationHooks,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        let dependencies = Arc::new(DependencyIndex::new());
        Self {
            transactions: TransactionTable::new(transactions),
            chain: IndexChain::new(index),
            sequence_buffer: SequenceBuffer::new(),
            admission: AdmissionController::new(Arc::clone(&ledger), Arc::clone(&dependencies)),
            dependencies,
            ledger,
            hooks,
            counters: EngineCounters::new(),
            metrics,
            unindexed: DashSet::new(),
            ready: AtomicBool::new(false),
            recovered: Mutex::new(RecoveredWork::default()),
        }
    }

    // ── Event entry points ─────────────────────────────────────────────

    /// Handle one consensus event and every follow-up it triggers.
    pub fn process(&self, event: &ConsensusEvent) -> Result<(), EngineError> {
        let _span = tracing_spans::event_span(event.kind(), event.hash()).entered();
        let started = Instant::now();
        let result = match event {
            ConsensusEvent::TrustChain {
                hash,
                time,
                trust_score,
            } => self.handle_trust_chain(hash, *time, *trust_score),
            ConsensusEvent::Dsp { hash, result } => self.handle_dsp(hash, result.clone()),
        };
        self.metrics
            .event_process_time_ms
            .observe(started.elapsed().as_secs_f64() * 1000.0);
        result
    }

    /// Record trust-chain consensus for `hash` and finalise if possible.
    ///
    /// A re-delivered signal is ignored.
    pub fn handle_trust_chain(
        &self,
        hash: &TxHash,
        time: Timestamp,
        trust_score: f64,
    ) -> Result<(), EngineError> {
        self.drive(|_| {
            self.transactions.lock_and_mutate(hash, |tx| {
                if tx.has_trust_chain_consensus() {
                    tracing::debug!(%hash, "trust-chain consensus re-delivered, ignoring");
                    return Ok(());
                }
                tx.trust_chain = Some(TrustChainConsensus { time, trust_score });
                self.counters.inc_trust_chain_confirmed();
                tracing::debug!(%hash, trust_score, "trust-chain consensus recorded");
                self.settle(tx);
                Ok(())
            })
        })
    }

    /// Attach a DSP result to `hash`, sequence it and continue as far as the
    /// chain and the balances allow.
    ///
    /// A second DSP result for the same transaction is a protocol violation
    /// and changes nothing.
    pub fn handle_dsp(
        &self,
        hash: &TxHash,
        result: DspConsensusResult,
    ) -> Result<(), EngineError> {
        self.drive(|work| {
            self.transactions.lock_and_mutate(hash, |tx| {
                if let Some(existing) = &tx.dsp_result {
                    return Err(EngineError::ProtocolViolation {
                        hash: *hash,
                        reason: format!(
                            "duplicate DSP result at index {} (already has index {})",
                            result.index, existing.index
                        ),
                    });
                }
                tx.dsp_result = Some(result);
                self.sequence_and_continue(tx, work)
            })
        })
    }

    /// Record a newly observed transaction and try to reserve its effects.
    pub fn insert_new_transaction(&self, tx: Transaction) -> Result<Observed, EngineError> {
        let hash = tx.hash;
        let mut reserved = false;
        let inserted = self.transactions.insert_if_absent(tx, |tx| {
            tx.trust_chain = None;
            tx.dsp_result = None;
            tx.indexed = false;
            tx.consensus_update_time = None;
            reserved = self.admission.pre_reserve(tx);
        })?;
        if !inserted {
            tracing::debug!(%hash, "transaction already known");
            return Ok(Observed::Duplicate);
        }
        self.unindexed.insert(hash);
        tracing::debug!(%hash, reserved, "new transaction observed");
        Ok(if reserved {
            Observed::Reserved
        } else {
            Observed::Unreserved
        })
    }

    // ── Follow-up driver ───────────────────────────────────────────────

    /// Run `first`, then every follow-up it (transitively) queues.
    ///
    /// Only `first`'s error is returned; follow-up failures concern other
    /// transactions and are logged.
    pub(crate) fn drive(
        &self,
        first: impl FnOnce(&mut VecDeque<FollowUp>) -> Result<(), EngineError>,
    ) -> Result<(), EngineError> {
        let mut work = VecDeque::new();
        let result = first(&mut work);
        if let Err(e) = &result {
            self.note_failure(e);
        }
        self.run_follow_ups(work);
        result
    }

    pub(crate) fn run_follow_ups(&self, mut work: VecDeque<FollowUp>) {
        while let Some(next) = work.pop_front() {
            let result = match next {
                FollowUp::Replay(hash) => {
                    let _span = tracing_spans::replay_span(&hash).entered();
                    self.metrics.replays.inc();
                    self.replay(&hash, &mut work)
                }
                FollowUp::Reevaluate(hash) => {
                    let _span = tracing_spans::cascade_span(&hash).entered();
                    self.metrics.cascades.inc();
                    self.reevaluate(&hash, &mut work)
                }
            };
            if let Err(e) = result {
                self.note_failure(&e);
                tracing::warn!(error = %e, ?next, "follow-up failed");
            }
        }
        self.refresh_gauges();
    }

    /// Re-enter sequencing for a transaction that already carries a DSP result.
    fn replay(&self, hash: &TxHash, work: &mut VecDeque<FollowUp>) -> Result<(), EngineError> {
        self.transactions.lock_and_mutate(hash, |tx| {
            if tx.dsp_result.is_none() {
                tracing::debug!(%hash, "nothing to replay, no DSP result");
                return Ok(());
            }
            if tx.indexed {
                self.settle(tx);
                return Ok(());
            }
            self.sequence_and_continue(tx, work)
        })
    }

    /// Retry admission for a blocked, DSP-confirmed transaction.
    fn reevaluate(&self, hash: &TxHash, work: &mut VecDeque<FollowUp>) -> Result<(), EngineError> {
        self.transactions.lock_and_mutate(hash, |tx| {
            if !tx.is_dsp_confirmed() || tx.is_valid() {
                return Ok(());
            }
            self.continue_indexed(tx, work)
        })
    }

    // ── State transitions (caller holds the transaction's lock) ────────

    fn sequence_and_continue(
        &self,
        tx: &mut Transaction,
        work: &mut VecDeque<FollowUp>,
    ) -> Result<(), EngineError> {
        if self.sequence(tx, work)? {
            self.continue_indexed(tx, work)?;
        }
        Ok(())
    }

    /// Try to make `tx`'s DSP index durable. Returns `false` when it had to
    /// wait in the sequence buffer.
    fn sequence(&self, tx: &mut Transaction, work: &mut VecDeque<FollowUp>) -> Result<bool, EngineError> {
        let Some(index) = tx.dsp_result.as_ref().map(|r| r.index) else {
            return Ok(false);
        };

        let mut cursor = self.chain.lock();
        let outcome = cursor.insert_next(tx.hash, index)?;
        match outcome {
            InsertOutcome::Gap { expected } => {
                match self.sequence_buffer.insert(index, tx.hash) {
                    BufferInsert::Buffered | BufferInsert::AlreadyBuffered => {
                        tracing::debug!(hash = %tx.hash, index, expected, "DSP result buffered until gap closes");
                        Ok(false)
                    }
                    BufferInsert::Conflict { existing } => Err(EngineError::ProtocolViolation {
                        hash: tx.hash,
                        reason: format!("index {index} is already buffered for {existing}"),
                    }),
                }
            }
            InsertOutcome::AlreadyIndexed => {
                drop(cursor);
                tx.indexed = true;
                self.unindexed.remove(&tx.hash);
                Ok(true)
            }
            InsertOutcome::Accepted(entry) => {
                if let Some(next) = self.sequence_buffer.take(entry.index + 1) {
                    work.push_back(FollowUp::Replay(next));
                }
                drop(cursor);
                tracing::debug!(hash = %tx.hash, index = entry.index, "index inserted");
                self.metrics.last_index.set(entry.index as i64);
                tx.indexed = true;
                self.unindexed.remove(&tx.hash);
                Ok(true)
            }
        }
    }

    /// Continue an indexed transaction according to its DSP outcome.
    fn continue_indexed(
        &self,
        tx: &mut Transaction,
        work: &mut VecDeque<FollowUp>,
    ) -> Result<(), EngineError> {
        let Some(result) = tx.dsp_result.clone() else {
            return Ok(());
        };

        if result.is_confirmed() {
            match self.admission.admit(tx) {
                AdmissionOutcome::Blocked => {
                    tracing::info!(hash = %tx.hash, index = result.index, "insufficient balance, transaction blocked");
                    return Ok(());
                }
                AdmissionOutcome::Skipped => return Ok(()),
                AdmissionOutcome::Reserved | AdmissionOutcome::AlreadyValid => {}
            }
            self.hooks.dsp_confirmed(tx);
            self.counters.inc_dsp_confirmed();
            tracing::debug!(hash = %tx.hash, index = result.index, "DSP confirmed");
            self.settle(tx);
        } else {
            let was_valid = tx.is_valid();
            let freed = self.admission.revoke(tx);
            if was_valid {
                tracing::info!(hash = %tx.hash, cascade = freed.len(), "DSP rejected, reservation rolled back");
            }
            work.extend(freed.into_iter().map(FollowUp::Reevaluate));
            tx.consensus_update_time = tx.consensus_time();
            self.hooks.dsp_rejected(tx);
            self.counters.inc_dsp_rejected();
            self.metrics.dsp_rejected.inc();
            self.hooks
                .address_history_changed(tx, TransactionStatus::Rejected);
        }
        Ok(())
    }

    /// Finalise `tx` if both signals are present and its effects are reserved.
    fn settle(&self, tx: &mut Transaction) {
        if !tx.has_trust_chain_consensus()
            || !tx.is_dsp_confirmed()
            || tx.balance != BalanceState::Reserved
        {
            return;
        }
        tx.consensus_update_time = tx.consensus_time();
        for transfer in &tx.base_transfers {
            self.ledger.update_balance(&transfer.address, transfer.amount);
        }
        tx.balance = BalanceState::Applied;
        self.counters.inc_total_confirmed();
        self.metrics.confirmed.inc();
        self.hooks
            .address_history_changed(tx, TransactionStatus::Confirmed);
        tracing::info!(hash = %tx.hash, "transaction confirmed");
    }

    fn note_failure(&self, error: &EngineError) {
        match error {
            EngineError::ProtocolViolation { .. } => self.metrics.protocol_violations.inc(),
            EngineError::UnknownTransaction(_) => self.metrics.events_dropped.inc(),
            _ => {}
        }
    }

    fn refresh_gauges(&self) {
        self.metrics
            .sequence_buffer_depth
            .set(self.sequence_buffer.len() as i64);
        self.metrics
            .blocked_transactions
            .set(self.dependencies.blocked_count() as i64);
    }

    // ── Read-only views ────────────────────────────────────────────────

    pub fn counters(&self) -> CountersSnapshot {
        self.counters.snapshot()
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn transaction(&self, hash: &TxHash) -> Result<Transaction, EngineError> {
        self.transactions.get(hash)
    }

    pub fn last_index(&self) -> Option<u64> {
        self.chain.last_index()
    }

    /// DSP indices waiting for their predecessor, ascending.
    pub fn buffered_indices(&self) -> Vec<u64> {
        self.sequence_buffer.indices()
    }

    pub fn blocked_under(&self, address: &Address) -> Vec<TxHash> {
        self.dependencies.blocked_under(address)
    }

    pub fn unindexed_count(&self) -> usize {
        self.unindexed.len()
    }
}
