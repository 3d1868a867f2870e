use std::io;
use thiserror::Error;

/// Failure to create the child process.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Cannot find executable '{program}'")]
    NotFound { program: String },

    #[error("Failed to launch '{program}': {source}")]
    Os {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Cannot launch an empty command")]
    EmptyCommand,
}

impl LaunchError {
    pub fn from_spawn(program: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            LaunchError::NotFound {
                program: program.to_string(),
            }
        } else {
            LaunchError::Os {
                program: program.to_string(),
                source,
            }
        }
    }
}

/// Failure to control a launched (or missing) process.
#[derive(Debug, Error)]
pub enum ProcessControlError {
    #[error("Cannot {operation}: no process is running")]
    NoProcess { operation: &'static str },

    #[error("Process {pid} is already running")]
    AlreadyRunning { pid: u32 },

    #[error("Failed to send {signal} to process {pid}: {source}")]
    Signal {
        signal: &'static str,
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("Failed to reap process {pid}: {source}")]
    Reap {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("Coverage generation failed: {message}")]
    Coverage { message: String },
}

/// Errors surfaced by the process monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(
        "Timeout while waiting for match '{pattern}' {count}x in the subprocess output"
    )]
    MatchTimeout { pattern: String, count: usize },

    #[error("Subprocess died while waiting for match '{pattern}' {count}x in the subprocess output")]
    PrematureExit { pattern: String, count: usize },

    #[error("Waiting for subprocess output failed: {reason}")]
    Wait {
        reason: String,
        #[source]
        source: Option<io::Error>,
    },

    #[error(transparent)]
    ProcessControl(#[from] ProcessControlError),
}

impl MonitorError {
    /// Short machine-readable kind, used for exit codes and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorError::Launch(LaunchError::NotFound { .. }) => "launch_not_found",
            MonitorError::Launch(_) => "launch_error",
            MonitorError::MatchTimeout { .. } => "match_timeout",
            MonitorError::PrematureExit { .. } => "premature_exit",
            MonitorError::Wait { .. } => "wait_error",
            MonitorError::ProcessControl(_) => "process_control",
        }
    }

    pub(crate) fn wait_io(reason: &str, source: io::Error) -> Self {
        MonitorError::Wait {
            reason: format!("{}: {}", reason, source),
            source: Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_not_found_maps_to_not_found_kind() {
        let err = LaunchError::from_spawn("nope", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, LaunchError::NotFound { ref program } if program == "nope"));
        assert_eq!(MonitorError::from(err).kind(), "launch_not_found");
    }

    #[test]
    fn other_spawn_failure_maps_to_os_kind() {
        let err = LaunchError::from_spawn(
            "srv",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, LaunchError::Os { .. }));
        assert_eq!(MonitorError::from(err).kind(), "launch_error");
    }

    #[test]
    fn timeout_message_names_pattern_and_count() {
        let err = MonitorError::MatchTimeout {
            pattern: "ready".to_string(),
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "Timeout while waiting for match 'ready' 2x in the subprocess output"
        );
        assert_eq!(err.kind(), "match_timeout");
    }
}
