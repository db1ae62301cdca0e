//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use concord_node::{BalanceBook, ConfirmationEngine, ConfirmationHooks};
use concord_nullables::{NullIndexStore, NullTransactionStore};
use concord_types::{
    Address, Amount, BaseTransfer, Timestamp, Transaction, TransactionStatus, TxHash,
};

pub const SOURCE: u8 = 0xA0;
pub const SINK: u8 = 0xB0;

pub fn addr(byte: u8) -> Address {
    Address::new([byte; 32])
}

/// A transaction moving `amount` from [`SOURCE`] to [`SINK`].
pub fn spend(id: u16, amount: i128) -> Transaction {
    let transfers = vec![
        BaseTransfer::input(addr(SOURCE), Amount::new(amount)),
        BaseTransfer::output(addr(SINK), Amount::new(amount)),
    ];
    let created_at = Timestamp::new(1_000 + id as u64);
    let hash = concord_crypto::hash_transaction(&transfers, created_at);
    Transaction::new(hash, transfers, created_at).expect("valid transaction")
}

/// Everything the hooks observed, in call order.
#[derive(Default)]
pub struct HookLog {
    pub dsp_confirmed: Mutex<Vec<TxHash>>,
    pub dsp_rejected: Mutex<Vec<TxHash>>,
    pub history: Mutex<Vec<(TxHash, TransactionStatus)>>,
    pub freed: Mutex<Vec<Address>>,
}

pub struct Fixture {
    pub engine: Arc<ConfirmationEngine>,
    pub book: Arc<BalanceBook>,
    pub tx_store: Arc<NullTransactionStore>,
    pub index_store: Arc<NullIndexStore>,
    pub log: Arc<HookLog>,
}

impl Fixture {
    /// An engine with [`SOURCE`] funded with `balance`, not yet validated.
    pub fn new(balance: i128) -> Self {
        Self::over(
            Arc::new(NullTransactionStore::new()),
            Arc::new(NullIndexStore::new()),
            balance,
        )
    }

    /// A validated, ready engine.
    pub fn ready(balance: i128) -> Self {
        let fixture = Self::new(balance);
        fixture
            .engine
            .validate_chain_from_genesis(None)
            .expect("empty chain validates");
        fixture
    }

    /// An engine over existing stores, e.g. to simulate a restart.
    pub fn over(
        tx_store: Arc<NullTransactionStore>,
        index_store: Arc<NullIndexStore>,
        balance: i128,
    ) -> Self {
        let log = Arc::new(HookLog::default());

        let freed_log = Arc::clone(&log);
        let book = Arc::new(
            BalanceBook::new()
                .with_freed_listener(move |a| freed_log.freed.lock().unwrap().push(*a)),
        );
        book.seed(addr(SOURCE), Amount::new(balance));

        let (l1, l2, l3) = (Arc::clone(&log), Arc::clone(&log), Arc::clone(&log));
        let hooks = ConfirmationHooks::new()
            .on_dsp_confirmed(move |tx| l1.dsp_confirmed.lock().unwrap().push(tx.hash))
            .on_dsp_rejected(move |tx| l2.dsp_rejected.lock().unwrap().push(tx.hash))
            .on_address_history_change(move |tx, status| {
                l3.history.lock().unwrap().push((tx.hash, status))
            });

        let engine = Arc::new(ConfirmationEngine::new(
            tx_store.clone(),
            index_store.clone(),
            book.clone(),
            hooks,
        ));
        Self {
            engine,
            book,
            tx_store,
            index_store,
            log,
        }
    }

    pub fn source_pre_balance(&self) -> Amount {
        self.book.pre_balance(&addr(SOURCE))
    }

    pub fn source_balance(&self) -> Amount {
        self.book.balance(&addr(SOURCE))
    }
}
