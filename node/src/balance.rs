//! Balance ledger collaborator.
//!
//! The engine never owns balances. It drives a [`BalanceLedger`] to reserve
//! provisional effects (pre-balance), apply final effects (balance) and roll
//! reservations back. [`BalanceBook`] is the in-memory implementation used by
//! the daemon and the tests.

use concord_types::{Address, Amount, BaseTransfer, Transaction};
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;

/// Balance operations the confirmation engine depends on.
pub trait BalanceLedger: Send + Sync {
    /// Apply a final, confirmed effect to `address`.
    fn update_balance(&self, address: &Address, amount: Amount);

    /// Apply a provisional effect to `address`'s pre-balance.
    fn update_pre_balance(&self, address: &Address, amount: Amount);

    /// Atomically check that every input address can cover its debits and,
    /// if so, apply all of `transfers` to the pre-balance.
    fn check_and_reserve(&self, transfers: &[BaseTransfer]) -> bool;

    /// Reverse the pre-balance effects of a previously reserved transaction.
    fn rollback(&self, tx: &Transaction);

    /// Called once per input address after a rollback freed balance there.
    fn on_balance_freed(&self, address: &Address);
}

type FreedListener = Box<dyn Fn(&Address) + Send + Sync>;

/// In-memory balance and pre-balance book.
pub struct BalanceBook {
    balances: DashMap<Address, Amount>,
    pre_balances: DashMap<Address, Amount>,
    /// Serialises check-then-apply on the pre-balance.
    reserve_lock: Mutex<()>,
    freed_listener: Option<FreedListener>,
}

impl BalanceBook {
    pub fn new() -> Self {
        Self {
            balances: DashMap::new(),
            pre_balances: DashMap::new(),
            reserve_lock: Mutex::new(()),
            freed_listener: None,
        }
    }

    /// Install a listener notified whenever a rollback frees an address.
    pub fn with_freed_listener(mut self, listener: impl Fn(&Address) + Send + Sync + 'static) -> Self {
        self.freed_listener = Some(Box::new(listener));
        self
    }

    /// Set both the balance and the pre-balance of `address`, e.g. from a snapshot.
    pub fn seed(&self, address: Address, amount: Amount) {
        let _guard = self.reserve_lock.lock();
        self.balances.insert(address, amount);
        self.pre_balances.insert(address, amount);
    }

    pub fn balance(&self, address: &Address) -> Amount {
        self.balances.get(address).map(|a| *a).unwrap_or_default()
    }

    pub fn pre_balance(&self, address: &Address) -> Amount {
        self.pre_balances.get(address).map(|a| *a).unwrap_or_default()
    }

    fn add_to(map: &DashMap<Address, Amount>, address: &Address, amount: Amount) {
        let mut entry = map.entry(*address).or_default();
        *entry = entry.saturating_add(amount);
    }
}

impl Default for BalanceBook {
    fn default() -> Self {
        Self::new()
    }
}

impl BalanceLedger for BalanceBook {
    fn update_balance(&self, address: &Address, amount: Amount) {
        Self::add_to(&self.balances, address, amount);
    }

    fn update_pre_balance(&self, address: &Address, amount: Amount) {
        let _guard = self.reserve_lock.lock();
        Self::add_to(&self.pre_balances, address, amount);
    }

    fn check_and_reserve(&self, transfers: &[BaseTransfer]) -> bool {
        let _guard = self.reserve_lock.lock();

        let mut debits: IndexMap<Address, Amount> = IndexMap::new();
        for transfer in transfers.iter().filter(|t| t.input) {
            let debit = debits.entry(transfer.address).or_default();
            *debit = debit.saturating_add(transfer.amount);
        }
        let covered = debits.iter().all(|(address, debit)| {
            let available = self.pre_balance(address);
            !available.saturating_add(*debit).is_negative()
        });
        if !covered {
            return false;
        }

        for transfer in transfers {
            Self::add_to(&self.pre_balances, &transfer.address, transfer.amount);
        }
        true
    }

    fn rollback(&self, tx: &Transaction) {
        let _guard = self.reserve_lock.lock();
        for transfer in &tx.base_transfers {
            Self::add_to(&self.pre_balances, &transfer.address, -transfer.amount);
        }
    }

    fn on_balance_freed(&self, address: &Address) {
        tracing::debug!(%address, "balance freed");
        if let Some(listener) = &self.freed_listener {
            listener(address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_types::{Timestamp, TxHash};
    use std::sync::{Arc, Mutex as StdMutex};

    fn addr(byte: u8) -> Address {
        Address::new([byte; 32])
    }

    fn spend(from: Address, to: Address, amount: i128) -> Vec<BaseTransfer> {
        vec![
            BaseTransfer::input(from, Amount::new(amount)),
            BaseTransfer::output(to, Amount::new(amount)),
        ]
    }

    #[test]
    fn reserve_succeeds_within_pre_balance() {
        let book = BalanceBook::new();
        book.seed(addr(1), Amount::new(10));

        assert!(book.check_and_reserve(&spend(addr(1), addr(2), 7)));
        assert_eq!(book.pre_balance(&addr(1)), Amount::new(3));
        assert_eq!(book.pre_balance(&addr(2)), Amount::new(7));
        // Final balances only move on confirmation.
        assert_eq!(book.balance(&addr(1)), Amount::new(10));
    }

    #[test]
    fn reserve_fails_without_side_effects() {
        let book = BalanceBook::new();
        book.seed(addr(1), Amount::new(5));

        assert!(!book.check_and_reserve(&spend(addr(1), addr(2), 6)));
        assert_eq!(book.pre_balance(&addr(1)), Amount::new(5));
        assert_eq!(book.pre_balance(&addr(2)), Amount::ZERO);
    }

    #[test]
    fn debits_on_one_address_are_aggregated() {
        let book = BalanceBook::new();
        book.seed(addr(1), Amount::new(10));
        let transfers = vec![
            BaseTransfer::input(addr(1), Amount::new(6)),
            BaseTransfer::input(addr(1), Amount::new(6)),
            BaseTransfer::output(addr(2), Amount::new(12)),
        ];
        assert!(!book.check_and_reserve(&transfers));
    }

    #[test]
    fn rollback_restores_pre_balance_and_notifies() {
        let freed = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&freed);
        let book = BalanceBook::new().with_freed_listener(move |a| sink.lock().unwrap().push(*a));
        book.seed(addr(1), Amount::new(10));

        let tx = Transaction::new(TxHash::new([1; 32]), spend(addr(1), addr(2), 7), Timestamp::EPOCH)
            .unwrap();
        assert!(book.check_and_reserve(&tx.base_transfers));
        book.rollback(&tx);
        book.on_balance_freed(&addr(1));

        assert_eq!(book.pre_balance(&addr(1)), Amount::new(10));
        assert_eq!(book.pre_balance(&addr(2)), Amount::ZERO);
        assert_eq!(*freed.lock().unwrap(), vec![addr(1)]);
    }
}
