//! Read-only consensus counters exposed to collaborators.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Engine counters. These are the source of truth; metrics mirror them.
#[derive(Default)]
pub struct EngineCounters {
    total_confirmed: AtomicU64,
    trust_chain_confirmed: AtomicU64,
    dsp_confirmed: AtomicU64,
    dsp_rejected: AtomicU64,
}

/// Point-in-time copy of [`EngineCounters`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub total_confirmed: u64,
    pub trust_chain_confirmed: u64,
    pub dsp_confirmed: u64,
    pub dsp_rejected: u64,
}

impl EngineCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc_total_confirmed(&self) {
        self.total_confirmed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_trust_chain_confirmed(&self) {
        self.trust_chain_confirmed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_dsp_confirmed(&self) {
        self.dsp_confirmed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_dsp_rejected(&self) {
        self.dsp_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_confirmed(&self) -> u64 {
        self.total_confirmed.load(Ordering::Relaxed)
    }

    pub fn trust_chain_confirmed(&self) -> u64 {
        self.trust_chain_confirmed.load(Ordering::Relaxed)
    }

    pub fn dsp_confirmed(&self) -> u64 {
        self.dsp_confirmed.load(Ordering::Relaxed)
    }

    pub fn dsp_rejected(&self) -> u64 {
        self.dsp_rejected.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            total_confirmed: self.total_confirmed(),
            trust_chain_confirmed: self.trust_chain_confirmed(),
            dsp_confirmed: self.dsp_confirmed(),
            dsp_rejected: self.dsp_rejected(),
        }
    }
}
