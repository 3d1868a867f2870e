//! Scoped server sessions for integration tests and the CLI.

use std::io::{self, Write};
use std::time::Duration;
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::monitor::ExitReport;
use crate::server::{Server, ServerError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// A running server that is torn down when the session ends.
///
/// Dropping an unfinished session terminates the server and echoes its log
/// to stderr, so a panicking test still leaves diagnostics behind.
pub struct ServerSession {
    server: Server,
    coverage: bool,
    finished: bool,
}

impl ServerSession {
    /// Launch `server` and block until `ready_pattern` shows up in its output.
    ///
    /// If the server never gets ready it is terminated, its log is echoed
    /// to stderr and the wait error is returned.
    pub fn start(
        mut server: Server,
        gst_option: &str,
        ready_pattern: &str,
        timeout: Duration,
    ) -> Result<Self, ServerError> {
        tracing::info!("running Server");
        let pid = server.run(gst_option)?;
        tracing::info!("waiting for Server (pid {}) to print '{}'", pid, ready_pattern);

        if let Err(err) = server.wait_for_output(ready_pattern, timeout, 1) {
            tracing::error!("Server did not get ready: {}", err);
            if let Err(e) = server.terminate_and_output_status(false, &mut io::stderr()) {
                tracing::warn!("cleanup after failed startup: {}", e);
            }
            return Err(err);
        }

        Ok(Self {
            server,
            coverage: false,
            finished: false,
        })
    }

    /// Start a session from a loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, SessionError> {
        let server = Server::new(config.server_options()?)
            .with_log_file(config.log_file())
            .with_tools_dir(config.harness.tools_dir.clone());
        Ok(Self::start(
            server,
            &config.server.gst_option,
            config.startup_pattern(),
            config.startup_timeout(),
        )?)
    }

    /// Collect coverage when the session ends.
    pub fn with_coverage(mut self, coverage: bool) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn server_mut(&mut self) -> &mut Server {
        &mut self.server
    }

    /// Terminate the server, report its status and echo its log to `out`.
    pub fn finish(mut self, out: &mut dyn Write) -> Result<ExitReport, ServerError> {
        self.finished = true;
        self.server.terminate_and_output_status(self.coverage, out)
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        if self.finished || self.server.pid().is_none() {
            return;
        }
        if let Err(e) = self
            .server
            .terminate_and_output_status(self.coverage, &mut io::stderr())
        {
            tracing::warn!("terminating server on drop failed: {}", e);
        }
    }
}
