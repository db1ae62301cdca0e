//! Confirmation service — the engine's lifecycle and event intake.
//!
//! [`ConfirmationService`] owns the worker tasks. Events are routed to a worker
//! by transaction hash, so all events for one transaction are processed by
//! the same worker in the order they were submitted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use concord_types::{DspConsensusResult, Timestamp, TxHash};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::counters::CountersSnapshot;
use crate::event::ConsensusEvent;
use crate::reconciliation::ConfirmationEngine;
use crate::shutdown::ShutdownController;
use crate::worker::spawn_worker;
use crate::EngineError;

pub struct ConfirmationService {
    engine: Arc<ConfirmationEngine>,
    config: EngineConfig,
    shutdown: ShutdownController,
    senders: RwLock<Option<Vec<mpsc::Sender<ConsensusEvent>>>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    accepting: AtomicBool,
}

impl ConfirmationService {
    pub fn new(engine: Arc<ConfirmationEngine>, config: EngineConfig) -> Self {
        Self {
            engine,
            config,
            shutdown: ShutdownController::new(),
            senders: RwLock::new(None),
            task_handles: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            accepting: AtomicBool::new(false),
        }
    }

    /// Spawn the workers. Requires a validated index chain.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), EngineError> {
        if !self.engine.is_ready() {
            return Err(EngineError::NotReady);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(EngineError::AlreadyStarted);
        }

        let workers = self.config.workers.max(1);
        let mut senders = Vec::with_capacity(workers);
        let mut handles = self.task_handles.lock();
        for id in 0..workers {
            let (tx, rx) = mpsc::channel(self.config.event_queue_capacity.max(1));
            senders.push(tx);
            handles.push(spawn_worker(
                id,
                Arc::clone(&self.engine),
                rx,
                self.shutdown.subscribe(),
            ));
        }
        *self.senders.write() = Some(senders);
        self.accepting.store(true, Ordering::Release);
        tracing::info!(workers, capacity = self.config.event_queue_capacity, "confirmation service started");
        Ok(())
    }

    pub async fn submit_trust_chain_event(
        &self,
        hash: TxHash,
        time: Timestamp,
        trust_score: f64,
    ) -> Result<(), EngineError> {
        self.submit(ConsensusEvent::TrustChain {
            hash,
            time,
            trust_score,
        })
        .await
    }

    pub async fn submit_dsp_event(
        &self,
        hash: TxHash,
        result: DspConsensusResult,
    ) -> Result<(), EngineError> {
        self.submit(ConsensusEvent::Dsp { hash, result }).await
    }

    /// Enqueue an event, waiting only when the target queue is full.
    ///
    /// Fails with [`EngineError::ShuttingDown`] outside `start()`..`stop()`;
    /// the event is logged and dropped.
    pub async fn submit(&self, event: ConsensusEvent) -> Result<(), EngineError> {
        let sender = if self.accepting.load(Ordering::Acquire) {
            self.senders
                .read()
                .as_ref()
                .map(|senders| senders[event.hash().shard(senders.len())].clone())
        } else {
            None
        };
        let Some(sender) = sender else {
            return Err(self.dropped(&event));
        };

        let hash = *event.hash();
        let kind = event.kind();
        match sender.send(event).await {
            Ok(()) => {
                self.engine.metrics().events_received.inc();
                Ok(())
            }
            Err(mpsc::error::SendError(event)) => {
                tracing::debug!(%hash, kind, "worker queue closed");
                Err(self.dropped(&event))
            }
        }
    }

    fn dropped(&self, event: &ConsensusEvent) -> EngineError {
        self.engine.metrics().events_dropped.inc();
        tracing::warn!(hash = %event.hash(), kind = event.kind(), "engine not accepting events, dropped");
        EngineError::ShuttingDown
    }

    /// Stop intake, signal the workers and wait for them to drain.
    pub async fn stop(&self) -> Result<(), EngineError> {
        tracing::info!("confirmation service stopping");
        self.accepting.store(false, Ordering::Release);
        // Dropping the senders lets idle workers observe a closed queue.
        self.senders.write().take();
        self.shutdown.shutdown();

        let handles: Vec<JoinHandle<()>> = self.task_handles.lock().drain(..).collect();
        let wait_all = async {
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "event worker panicked");
                }
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout(), wait_all)
            .await
            .is_err()
        {
            tracing::warn!(
                "shutdown timeout ({:?}), some workers may still be draining",
                self.config.shutdown_timeout()
            );
            return Err(EngineError::ShutdownTimeout);
        }

        tracing::info!(counters = ?self.engine.counters(), "confirmation service stopped");
        Ok(())
    }

    /// The controller the workers listen on, e.g. to wire up OS signals.
    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    pub fn engine(&self) -> &Arc<ConfirmationEngine> {
        &self.engine
    }

    pub fn counters(&self) -> CountersSnapshot {
        self.engine.counters()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }
}
