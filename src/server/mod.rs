//! Lifecycle wrapper around the external `gst-switch-srv` process.

mod command;
mod coverage;
mod error;
mod options;

pub use command::{
    build_command, resolve_executable, resolve_executable_in, ServerCommand, SERVER_BINARY,
};
pub use coverage::make_coverage;
pub use error::ServerError;
pub use options::{
    ControllerAddress, Port, RecordFile, ServerOptions, ValidationError,
    DEFAULT_AUDIO_PORT, DEFAULT_CONTROLLER_ADDRESS, DEFAULT_VIDEO_PORT,
};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::monitor::{
    ExitReport, MirrorSink, MonitorError, ProcessControlError, ProcessMonitor, ReadOutcome,
    READ_CHUNK_SIZE,
};

/// Log file the server output is mirrored to, relative to the working dir.
pub const DEFAULT_LOG_FILE: &str = "server.log";

/// Default budget for [`Server::wait_for_output`] callers.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs and supervises one `gst-switch-srv` instance.
pub struct Server {
    options: ServerOptions,
    log_file: Option<PathBuf>,
    tools_dir: Option<PathBuf>,
    gst_option: String,
    monitor: Option<ProcessMonitor>,
}

impl Server {
    /// Server logging to `server.log` in the working directory.
    pub fn new(options: ServerOptions) -> Self {
        Self {
            options,
            log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            tools_dir: None,
            gst_option: String::new(),
            monitor: None,
        }
    }

    /// Mirror output to `path`, or to stderr when `None`.
    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }

    /// Directory holding the server's build tree, used for coverage.
    pub fn with_tools_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.tools_dir = dir;
        self
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    pub fn gst_option(&self) -> &str {
        &self.gst_option
    }

    pub fn monitor(&self) -> Option<&ProcessMonitor> {
        self.monitor.as_ref()
    }

    /// Launch the server. `gst_option` is appended verbatim.
    pub fn run(&mut self, gst_option: &str) -> Result<u32, ServerError> {
        if let Some(pid) = self.pid() {
            return Err(ProcessControlError::AlreadyRunning { pid }.into());
        }
        self.gst_option = gst_option.to_string();
        tracing::debug!("Starting server");

        let command = build_command(&self.options, &self.gst_option)
            .map_err(MonitorError::from)?;
        let mirror = match &self.log_file {
            Some(path) => MirrorSink::create_file(path).map_err(|source| ServerError::LogFile {
                path: path.clone(),
                source,
            })?,
            None => MirrorSink::stderr(),
        };

        tracing::info!("Starting process {:?}", command);
        let mut monitor = ProcessMonitor::new(command, Some(mirror));
        let pid = monitor.start()?;
        self.monitor = Some(monitor);
        Ok(pid)
    }

    pub fn pid(&self) -> Option<u32> {
        self.monitor.as_ref().and_then(ProcessMonitor::pid)
    }

    pub fn is_alive(&mut self) -> bool {
        self.monitor.as_mut().is_some_and(ProcessMonitor::is_alive)
    }

    pub fn wait_for_output(
        &mut self,
        pattern: &str,
        timeout: Duration,
        count: usize,
    ) -> Result<(), ServerError> {
        let monitor = self.running_monitor("wait for output")?;
        Ok(monitor.wait_for_output(pattern, timeout, count)?)
    }

    /// Keep the output pipe drained; waits up to `poll_timeout` for data.
    pub fn read_available(&mut self, poll_timeout: Duration) -> Result<ReadOutcome, ServerError> {
        let monitor = self.running_monitor("read output")?;
        Ok(monitor.read_available(READ_CHUNK_SIZE, poll_timeout)?)
    }

    /// Terminate gracefully. With `coverage`, flush and collect coverage
    /// counters first.
    pub fn terminate(&mut self, coverage: bool) -> Result<ExitReport, ServerError> {
        if coverage {
            self.collect_coverage()?;
        }
        tracing::info!("Killing server");
        let monitor = self.running_monitor("terminate")?;
        Ok(monitor.terminate()?)
    }

    /// Kill with SIGKILL. With `coverage`, collect coverage first.
    pub fn kill(&mut self, coverage: bool) -> Result<ExitReport, ServerError> {
        if coverage {
            self.collect_coverage()?;
        }
        let monitor = self.running_monitor("kill")?;
        Ok(monitor.kill()?)
    }

    /// Ask the server to write its gcov counters without stopping it.
    pub fn gcov_flush(&mut self) -> Result<(), ServerError> {
        let monitor = self.running_monitor("flush coverage")?;
        Ok(monitor.flush_diagnostics()?)
    }

    /// Log how the server ended, terminate it and echo the log to `out`.
    ///
    /// A process that already died is reported with its own exit code
    /// (a segmentation fault is called out separately); a running one is
    /// terminated and its termination status is returned.
    pub fn terminate_and_output_status(
        &mut self,
        coverage: bool,
        out: &mut dyn Write,
    ) -> Result<ExitReport, ServerError> {
        let monitor = self.running_monitor("terminate")?;
        let early_exit = monitor.poll()?;
        if let Some(report) = early_exit {
            if report.is_segfault() {
                tracing::error!("Server exited with Segmentation Fault");
            }
            if !report.success() {
                tracing::error!("Server exited Error Code {}", report.code());
            }
        }

        let report = if early_exit.is_some() {
            self.running_monitor("terminate")?.terminate()?
        } else {
            self.terminate(coverage)?
        };

        if let Err(e) = self.dump_log(out) {
            tracing::warn!("cannot echo server log: {}", e);
        }
        Ok(report)
    }

    /// Copy the mirrored log (or the captured buffer if logging to stderr).
    pub fn dump_log(&self, out: &mut dyn Write) -> std::io::Result<()> {
        match &self.log_file {
            Some(path) => out.write_all(&fs::read(path)?),
            None => match &self.monitor {
                Some(monitor) => out.write_all(monitor.buffer().snapshot().as_bytes()),
                None => Ok(()),
            },
        }
    }

    fn collect_coverage(&mut self) -> Result<(), ServerError> {
        self.gcov_flush()?;
        make_coverage(self.tools_dir.as_deref())?;
        Ok(())
    }

    fn running_monitor(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut ProcessMonitor, ProcessControlError> {
        self.monitor
            .as_mut()
            .filter(|m| m.has_process())
            .ok_or(ProcessControlError::NoProcess { operation })
    }
}
