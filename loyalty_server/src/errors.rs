use std::time::Duration;

use accrual_tools::AccrualApiError;
use loyalty_engine::SettlementError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(#[from] SettlementError),
    #[error("Could not create the accrual client. {0}")]
    AccrualClientError(#[from] AccrualApiError),
    #[error("The reconciliation pipeline stopped with an error. {0}")]
    PipelineError(#[from] ReconcileError),
    #[error("The reconciliation pipeline did not stop within {0:?}")]
    ShutdownTimeout(Duration),
}

/// Errors that end a reconciliation task.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("Settlement store failure. {0}")]
    Store(#[from] SettlementError),
    #[error("A reconciliation task failed. {0}")]
    TaskFailed(String),
}

impl ReconcileError {
    /// Fatal errors stop the whole pipeline, not just the task that saw them.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Store(e) => e.is_fatal(),
            Self::TaskFailed(_) => true,
        }
    }
}
