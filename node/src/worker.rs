//! Event worker task.
//!
//! Each worker owns one bounded queue and processes its events strictly in
//! arrival order. Engine calls take blocking locks and may run whole
//! cascades, so each one runs on the blocking pool and is awaited before the
//! next event is taken. On shutdown the worker stops taking new iterations,
//! closes its queue and drains what was already enqueued before it returns.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::event::ConsensusEvent;
use crate::reconciliation::ConfirmationEngine;
use crate::EngineError;

/// Spawn worker `id` consuming `rx` until shutdown.
pub(crate) fn spawn_worker(
    id: usize,
    engine: Arc<ConfirmationEngine>,
    mut rx: mpsc::Receiver<ConsensusEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(worker = id, "event worker started");
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!(worker = id, "event worker received shutdown");
                    break;
                }
                event = rx.recv() => match event {
                    Some(event) => event,
                    // Every sender dropped.
                    None => break,
                },
            };
            handle_event(id, &engine, event).await;
        }

        rx.close();
        let mut drained = 0usize;
        while let Ok(event) = rx.try_recv() {
            handle_event(id, &engine, event).await;
            drained += 1;
        }
        tracing::info!(worker = id, drained, "event worker stopped");
    })
}

/// Process one event, logging failures. Nothing escalates past the worker.
async fn handle_event(id: usize, engine: &Arc<ConfirmationEngine>, event: ConsensusEvent) {
    let hash = *event.hash();
    let kind = event.kind();
    let engine = Arc::clone(engine);
    let outcome = tokio::task::spawn_blocking(move || engine.process(&event)).await;
    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(worker = id, %hash, error = %e, "event processing task failed");
            return;
        }
    };
    match result {
        Ok(()) => {}
        Err(EngineError::ProtocolViolation { hash, reason }) => {
            tracing::warn!(worker = id, %hash, %reason, "protocol violation, event dropped");
        }
        Err(EngineError::UnknownTransaction(hash)) => {
            tracing::warn!(worker = id, %hash, kind, "event for unknown transaction dropped");
        }
        Err(e) => {
            tracing::error!(worker = id, %hash, error = %e, "event processing failed");
        }
    }
}
