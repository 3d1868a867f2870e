use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::monitor::{MonitorError, ProcessControlError};

/// Errors raised by [`Server`](crate::server::Server).
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to open server log '{path}': {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

impl From<ProcessControlError> for ServerError {
    fn from(err: ProcessControlError) -> Self {
        ServerError::Monitor(MonitorError::ProcessControl(err))
    }
}

impl ServerError {
    /// Machine-readable kind, used for CLI exit codes.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::LogFile { .. } => "log_file",
            ServerError::Monitor(err) => err.kind(),
        }
    }
}
