//! Node-role continuation hooks.
//!
//! Different node roles react differently once a transaction's DSP outcome
//! or address history changes. Each role injects its reactions here instead of
//! subclassing the engine.

use concord_types::{Transaction, TransactionStatus};

type TxHook = Box<dyn Fn(&Transaction) + Send + Sync>;
type HistoryHook = Box<dyn Fn(&Transaction, TransactionStatus) + Send + Sync>;

/// Callback set invoked inline by the reconciliation engine.
///
/// Hooks run on the worker while the transaction's lock is held; keep them
/// fast and never call back into the engine from them.
#[derive(Default)]
pub struct ConfirmationHooks {
    on_dsp_confirmed: Option<TxHook>,
    on_dsp_rejected: Option<TxHook>,
    on_address_history_change: Option<HistoryHook>,
}

impl ConfirmationHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_dsp_confirmed(mut self, hook: impl Fn(&Transaction) + Send + Sync + 'static) -> Self {
        self.on_dsp_confirmed = Some(Box::new(hook));
        self
    }

    pub fn on_dsp_rejected(mut self, hook: impl Fn(&Transaction) + Send + Sync + 'static) -> Self {
        self.on_dsp_rejected = Some(Box::new(hook));
        self
    }

    pub fn on_address_history_change(
        mut self,
        hook: impl Fn(&Transaction, TransactionStatus) + Send + Sync + 'static,
    ) -> Self {
        self.on_address_history_change = Some(Box::new(hook));
        self
    }

    pub(crate) fn dsp_confirmed(&self, tx: &Transaction) {
        if let Some(hook) = &self.on_dsp_confirmed {
            hook(tx);
        }
    }

    pub(crate) fn dsp_rejected(&self, tx: &Transaction) {
        if let Some(hook) = &self.on_dsp_rejected {
            hook(tx);
        }
    }

    pub(crate) fn address_history_changed(&self, tx: &Transaction, status: TransactionStatus) {
        if let Some(hook) = &self.on_address_history_change {
            hook(tx, status);
        }
    }
}
