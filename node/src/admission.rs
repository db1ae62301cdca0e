//! Admission controller — optimistic balance reservation.
//!
//! A transaction's balance effects may be reserved against the pre-balance
//! before its confirmation is final. When the reservation does not fit, the
//! transaction is parked in the [`DependencyIndex`] under each input address
//! until a rollback frees balance there.
//!
//! A failed check and its registration happen under the same gate as a
//! rollback and its collection of waiters. Either the rollback lands first
//! and the check sees the freed balance, or the registration lands first and
//! the rollback collects the waiter.

use std::sync::Arc;

use concord_types::{BalanceState, Transaction, TxHash};
use parking_lot::Mutex;

use crate::balance::BalanceLedger;
use crate::dependency_index::DependencyIndex;

/// Outcome of an admission attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// Effects were already reserved earlier; nothing to do.
    AlreadyValid,
    /// The reservation succeeded now.
    Reserved,
    /// Insufficient balance; the transaction waits in the dependency index.
    Blocked,
    /// DSP-rejected transactions are never reserved.
    Skipped,
}

pub struct AdmissionController {
    ledger: Arc<dyn BalanceLedger>,
    dependencies: Arc<DependencyIndex>,
    gate: Mutex<()>,
}

impl AdmissionController {
    pub fn new(ledger: Arc<dyn BalanceLedger>, dependencies: Arc<DependencyIndex>) -> Self {
        Self {
            ledger,
            dependencies,
            gate: Mutex::new(()),
        }
    }

    /// Try to reserve a transaction's effects ahead of its final confirmation.
    pub fn admit(&self, tx: &mut Transaction) -> AdmissionOutcome {
        if tx.is_valid() {
            return AdmissionOutcome::AlreadyValid;
        }
        if tx.is_dsp_rejected() {
            return AdmissionOutcome::Skipped;
        }

        let inputs = tx.input_addresses();
        let _gate = self.gate.lock();
        if self.ledger.check_and_reserve(&tx.base_transfers) {
            tx.balance = BalanceState::Reserved;
            self.dependencies.release(&tx.hash, &inputs);
            AdmissionOutcome::Reserved
        } else {
            tx.balance = BalanceState::Blocked;
            self.dependencies.register(tx.hash, &inputs);
            AdmissionOutcome::Blocked
        }
    }

    /// Reserve a newly observed transaction if its inputs are covered.
    ///
    /// A failed attempt is not blocking: the transaction is simply left
    /// unreserved and checked again once its DSP result is indexed.
    pub fn pre_reserve(&self, tx: &mut Transaction) -> bool {
        if self.ledger.check_and_reserve(&tx.base_transfers) {
            tx.balance = BalanceState::Reserved;
            true
        } else {
            tx.balance = BalanceState::Unreserved;
            false
        }
    }

    /// Undo whatever admission did for a rejected transaction.
    ///
    /// A reserved transaction is rolled back and the other transactions that
    /// were blocked on its input addresses are returned for re-evaluation. A
    /// transaction that never held a reservation triggers no rollback and no
    /// cascade.
    pub fn revoke(&self, tx: &mut Transaction) -> Vec<TxHash> {
        let inputs = tx.input_addresses();

        if !tx.is_valid() {
            if tx.balance == BalanceState::Blocked {
                self.dependencies.release(&tx.hash, &inputs);
                tx.balance = BalanceState::Unreserved;
            }
            return Vec::new();
        }

        let freed = {
            let _gate = self.gate.lock();
            self.ledger.rollback(tx);
            tx.balance = BalanceState::RolledBack;
            self.dependencies.release_and_collect(&tx.hash, &inputs)
        };
        for address in &inputs {
            self.ledger.on_balance_freed(address);
        }
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::BalanceBook;
    use concord_types::{Address, Amount, BaseTransfer, DspConsensusResult, Timestamp};

    fn addr(byte: u8) -> Address {
        Address::new([byte; 32])
    }

    fn spend(id: u8, amount: i128) -> Transaction {
        Transaction::new(
            TxHash::new([id; 32]),
            vec![
                BaseTransfer::input(addr(1), Amount::new(amount)),
                BaseTransfer::output(addr(9), Amount::new(amount)),
            ],
            Timestamp::new(id as u64),
        )
        .unwrap()
    }

    fn setup(balance: i128) -> (Arc<BalanceBook>, Arc<DependencyIndex>, AdmissionController) {
        let book = Arc::new(BalanceBook::new());
        book.seed(addr(1), Amount::new(balance));
        let deps = Arc::new(DependencyIndex::new());
        let controller = AdmissionController::new(book.clone(), deps.clone());
        (book, deps, controller)
    }

    #[test]
    fn admit_reserves_then_blocks() {
        let (book, deps, controller) = setup(10);
        let mut a = spend(1, 7);
        let mut b = spend(2, 6);

        assert_eq!(controller.admit(&mut a), AdmissionOutcome::Reserved);
        assert_eq!(controller.admit(&mut a), AdmissionOutcome::AlreadyValid);
        assert_eq!(controller.admit(&mut b), AdmissionOutcome::Blocked);

        assert_eq!(b.balance, BalanceState::Blocked);
        assert_eq!(deps.blocked_under(&addr(1)), vec![b.hash]);
        assert_eq!(book.pre_balance(&addr(1)), Amount::new(3));
    }

    #[test]
    fn dsp_rejected_is_skipped() {
        let (_, _, controller) = setup(10);
        let mut tx = spend(1, 1);
        tx.dsp_result = Some(DspConsensusResult::rejected(0, Timestamp::EPOCH));
        tx.indexed = true;
        assert_eq!(controller.admit(&mut tx), AdmissionOutcome::Skipped);
        assert_eq!(tx.balance, BalanceState::Unreserved);
    }

    #[test]
    fn revoke_rolls_back_and_collects_blocked() {
        let (book, deps, controller) = setup(10);
        let mut a = spend(1, 7);
        let mut b = spend(2, 6);
        controller.admit(&mut a);
        controller.admit(&mut b);

        let freed = controller.revoke(&mut a);
        assert_eq!(freed, vec![b.hash]);
        assert_eq!(a.balance, BalanceState::RolledBack);
        assert_eq!(book.pre_balance(&addr(1)), Amount::new(10));

        assert_eq!(controller.admit(&mut b), AdmissionOutcome::Reserved);
        assert!(deps.is_empty());
    }

    #[test]
    fn revoke_without_reservation_is_a_noop() {
        let (book, _, controller) = setup(10);
        let mut tx = spend(1, 3);
        assert!(controller.revoke(&mut tx).is_empty());
        assert_eq!(tx.balance, BalanceState::Unreserved);
        assert_eq!(book.pre_balance(&addr(1)), Amount::new(10));
    }

    #[test]
    fn revoke_of_blocked_releases_without_cascade() {
        let (_, deps, controller) = setup(1);
        let mut a = spend(1, 5);
        let mut b = spend(2, 5);
        controller.admit(&mut a);
        controller.admit(&mut b);

        assert!(controller.revoke(&mut a).is_empty());
        assert_eq!(deps.blocked_under(&addr(1)), vec![b.hash]);
    }

    /// Ledger that runs `interleave` the first time a reservation fails,
    /// before the failure reaches the controller.
    struct InterleavingLedger {
        inner: BalanceBook,
        interleave: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl BalanceLedger for InterleavingLedger {
        fn update_balance(&self, address: &Address, amount: Amount) {
            self.inner.update_balance(address, amount);
        }

        fn update_pre_balance(&self, address: &Address, amount: Amount) {
            self.inner.update_pre_balance(address, amount);
        }

        fn check_and_reserve(&self, transfers: &[BaseTransfer]) -> bool {
            let reserved = self.inner.check_and_reserve(transfers);
            if !reserved {
                let interleave = self.interleave.lock().take();
                if let Some(interleave) = interleave {
                    interleave();
                }
            }
            reserved
        }

        fn rollback(&self, tx: &Transaction) {
            self.inner.rollback(tx);
        }

        fn on_balance_freed(&self, address: &Address) {
            self.inner.on_balance_freed(address);
        }
    }

    #[test]
    fn rollback_racing_a_failed_check_still_collects_the_waiter() {
        let book = BalanceBook::new();
        book.seed(addr(1), Amount::new(10));
        let ledger = Arc::new(InterleavingLedger {
            inner: book,
            interleave: Mutex::new(None),
        });
        let deps = Arc::new(DependencyIndex::new());
        let controller = Arc::new(AdmissionController::new(ledger.clone(), deps.clone()));

        let mut a = spend(1, 8);
        let mut b = spend(2, 5);
        assert_eq!(controller.admit(&mut a), AdmissionOutcome::Reserved);

        // A is rejected on another thread between B's failed check and B's
        // registration. The check waits briefly for that rollback to finish.
        let rollback: Arc<Mutex<Option<std::thread::JoinHandle<Vec<TxHash>>>>> =
            Arc::new(Mutex::new(None));
        let slot = Arc::clone(&rollback);
        let racer = Arc::clone(&controller);
        *ledger.interleave.lock() = Some(Box::new(move || {
            let (done_tx, done_rx) = std::sync::mpsc::channel();
            let handle = std::thread::spawn(move || {
                let freed = racer.revoke(&mut a);
                let _ = done_tx.send(());
                freed
            });
            let _ = done_rx.recv_timeout(std::time::Duration::from_millis(100));
            *slot.lock() = Some(handle);
        }));

        assert_eq!(controller.admit(&mut b), AdmissionOutcome::Blocked);
        let handle = rollback.lock().take().expect("interleaving ran");
        let freed = handle.join().unwrap();

        assert_eq!(freed, vec![b.hash]);
        assert_eq!(ledger.inner.pre_balance(&addr(1)), Amount::new(10));
        assert_eq!(controller.admit(&mut b), AdmissionOutcome::Reserved);
        assert!(deps.is_empty());
    }

    #[test]
    fn pre_reserve_leaves_unreserved_on_failure() {
        let (_, deps, controller) = setup(2);
        let mut tx = spend(1, 3);
        assert!(!controller.pre_reserve(&mut tx));
        assert_eq!(tx.balance, BalanceState::Unreserved);
        assert!(deps.is_empty());
    }
}
