use concord_types::TxHash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("protocol violation on {hash}: {reason}")]
    ProtocolViolation { hash: TxHash, reason: String },

    #[error("index chain integrity failure after index {last_good_index:?}: {reason}")]
    Integrity {
        /// Highest index that validated, `None` if the failure is at index 0.
        last_good_index: Option<u64>,
        reason: String,
    },

    #[error("engine is shutting down")]
    ShuttingDown,

    #[error("engine already started")]
    AlreadyStarted,

    #[error("shutdown timeout")]
    ShutdownTimeout,

    #[error("index chain has not been validated")]
    NotReady,

    #[error("index chain already validated, saved transactions can no longer be loaded")]
    AlreadyValidated,

    #[error("unknown transaction: {0}")]
    UnknownTransaction(TxHash),

    #[error("store error: {0}")]
    Store(#[from] concord_store::StoreError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
