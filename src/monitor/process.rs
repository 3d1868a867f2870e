use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use crate::monitor::buffer::OutputBuffer;
use crate::monitor::error::{LaunchError, MonitorError, ProcessControlError};
use crate::monitor::mirror::MirrorSink;
use crate::monitor::reader::{OutputReader, ReadOutcome, READ_CHUNK_SIZE};
use crate::monitor::stream::{pipe, OutputStream, PipeStream};

/// How long each poll waits while a terminated child is being reaped.
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Signals the monitor sends to its child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Term,
    Kill,
    /// Asks the server to dump coverage counters.
    Usr1,
}

impl Signal {
    pub fn as_raw(self) -> libc::c_int {
        match self {
            Signal::Term => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
            Signal::Usr1 => libc::SIGUSR1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Signal::Term => "SIGTERM",
            Signal::Kill => "SIGKILL",
            Signal::Usr1 => "SIGUSR1",
        }
    }
}

/// The OS process behind a monitor.
pub trait ChildHandle {
    fn pid(&self) -> u32;
    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>>;
    fn send_signal(&mut self, signal: Signal) -> io::Result<()>;
    fn wait(&mut self) -> io::Result<ExitStatus>;
}

impl ChildHandle for Child {
    fn pid(&self) -> u32 {
        self.id()
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        Child::try_wait(self)
    }

    fn send_signal(&mut self, signal: Signal) -> io::Result<()> {
        let pid = libc::pid_t::try_from(self.id())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
        if unsafe { libc::kill(pid, signal.as_raw()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        Child::wait(self)
    }
}

/// Exit of a reaped child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    status: ExitStatus,
}

impl ExitReport {
    pub fn status(&self) -> ExitStatus {
        self.status
    }

    /// Exit code, or the negated signal number if a signal ended the
    /// process (a segmentation fault reports `-11`).
    pub fn code(&self) -> i32 {
        match (self.status.code(), self.status.signal()) {
            (Some(code), _) => code,
            (None, Some(signal)) => -signal,
            (None, None) => -1,
        }
    }

    pub fn is_segfault(&self) -> bool {
        self.code() == -libc::SIGSEGV
    }

    pub fn success(&self) -> bool {
        self.code() == 0
    }
}

impl From<ExitStatus> for ExitReport {
    fn from(status: ExitStatus) -> Self {
        Self { status }
    }
}

impl std::fmt::Display for ExitReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status.signal() {
            Some(signal) => write!(f, "killed by signal {}", signal),
            None => write!(f, "exit code {}", self.code()),
        }
    }
}

struct Running<C, S> {
    child: C,
    reader: OutputReader<S>,
}

/// Launches a command and watches its combined stdout/stderr.
///
/// Output is only read while a caller is inside [`wait_for_output`],
/// [`terminate`] or [`kill`]; there is no background reader thread.
///
/// [`wait_for_output`]: ProcessMonitor::wait_for_output
/// [`terminate`]: ProcessMonitor::terminate
/// [`kill`]: ProcessMonitor::kill
pub struct ProcessMonitor<C: ChildHandle = Child, S: OutputStream = PipeStream> {
    command: Vec<String>,
    buffer: Arc<OutputBuffer>,
    mirror: Option<MirrorSink>,
    running: Option<Running<C, S>>,
    last_exit: Option<ExitReport>,
}

impl ProcessMonitor {
    pub fn new(command: Vec<String>, mirror: Option<MirrorSink>) -> Self {
        Self {
            command,
            buffer: Arc::new(OutputBuffer::new()),
            mirror,
            running: None,
            last_exit: None,
        }
    }

    /// Spawn the command with stdout and stderr on one pipe.
    ///
    /// The mirror is handed back when the process is stopped, so a
    /// restarted process keeps writing to it.
    pub fn start(&mut self) -> Result<u32, MonitorError> {
        if let Some(running) = &self.running {
            return Err(ProcessControlError::AlreadyRunning {
                pid: running.child.pid(),
            }
            .into());
        }
        let (program, args) = self
            .command
            .split_first()
            .ok_or(LaunchError::EmptyCommand)?;

        tracing::debug!("starting subprocess {:?}", self.command);
        let (stream, write_end) =
            pipe().map_err(|source| LaunchError::from_spawn(program, source))?;

        // The Command owns the parent's copies of the write end; dropping it
        // at the end of this block lets the reader see end-of-stream.
        let child = {
            let stderr_end = write_end
                .try_clone()
                .map_err(|source| LaunchError::from_spawn(program, source))?;
            let mut cmd = Command::new(program);
            cmd.args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::from(write_end))
                .stderr(Stdio::from(stderr_end));
            cmd.spawn()
                .map_err(|source| LaunchError::from_spawn(program, source))?
        };

        let pid = child.id();
        tracing::info!("subprocess {} started (pid {})", program, pid);
        self.buffer = Arc::new(OutputBuffer::new());
        self.last_exit = None;
        let reader = OutputReader::new(stream, Arc::clone(&self.buffer), self.mirror.take());
        self.running = Some(Running { child, reader });
        Ok(pid)
    }
}

impl<C: ChildHandle, S: OutputStream> ProcessMonitor<C, S> {
    /// Build a monitor around an already running child.
    pub fn attach(command: Vec<String>, child: C, stream: S, mirror: Option<MirrorSink>) -> Self {
        let buffer = Arc::new(OutputBuffer::new());
        let reader = OutputReader::new(stream, Arc::clone(&buffer), mirror);
        Self {
            command,
            buffer,
            mirror: None,
            running: Some(Running { child, reader }),
            last_exit: None,
        }
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn pid(&self) -> Option<u32> {
        self.running.as_ref().map(|r| r.child.pid())
    }

    pub fn has_process(&self) -> bool {
        self.running.is_some()
    }

    /// Captured output, shared with the reader.
    pub fn buffer(&self) -> Arc<OutputBuffer> {
        Arc::clone(&self.buffer)
    }

    /// Exit of the last process this monitor reaped.
    pub fn exit_status(&self) -> Option<ExitReport> {
        self.last_exit
    }

    /// Non-blocking exit check. `Ok(None)` while the process runs.
    pub fn poll(&mut self) -> Result<Option<ExitReport>, ProcessControlError> {
        let Some(running) = self.running.as_mut() else {
            return Ok(self.last_exit);
        };
        let pid = running.child.pid();
        let status = running
            .child
            .try_wait()
            .map_err(|source| ProcessControlError::Reap { pid, source })?;
        Ok(status.map(ExitReport::from))
    }

    /// `true` while a process is present and has not reported an exit.
    pub fn is_alive(&mut self) -> bool {
        match self.poll() {
            Ok(status) => self.running.is_some() && status.is_none(),
            Err(e) => {
                tracing::warn!("cannot query subprocess state: {}", e);
                self.running.is_some()
            }
        }
    }

    pub fn check_for_output(&self, pattern: &str, count: usize) -> bool {
        tracing::debug!("testing for {}x '{}' in buffer", count, pattern);
        self.buffer.contains_at_least(pattern, count)
    }

    /// Block until `pattern` appeared `count` times in the output.
    pub fn wait_for_output(
        &mut self,
        pattern: &str,
        timeout: Duration,
        count: usize,
    ) -> Result<(), MonitorError> {
        match self.running.as_mut() {
            Some(running) => running.reader.wait_for(pattern, timeout, count),
            None if self.buffer.contains_at_least(pattern, count) => Ok(()),
            None => Err(ProcessControlError::NoProcess {
                operation: "wait for output",
            }
            .into()),
        }
    }

    /// One poll-then-read step, for callers that only need to keep the
    /// pipe drained while the process runs.
    pub fn read_available(
        &mut self,
        max_bytes: usize,
        poll_timeout: Duration,
    ) -> Result<ReadOutcome, MonitorError> {
        let running = self.running.as_mut().ok_or(ProcessControlError::NoProcess {
            operation: "read output",
        })?;
        running
            .reader
            .read_available(max_bytes, poll_timeout)
            .map_err(|e| MonitorError::wait_io("reading subprocess output failed", e))
    }

    /// Drain pending output, send SIGTERM and wait for the process to exit.
    ///
    /// Output produced while shutting down keeps flowing into the buffer
    /// and mirror until the process is reaped.
    pub fn terminate(&mut self) -> Result<ExitReport, ProcessControlError> {
        self.stop(Signal::Term, "terminate")
    }

    /// Send SIGKILL and reap the process.
    pub fn kill(&mut self) -> Result<ExitReport, ProcessControlError> {
        self.stop(Signal::Kill, "kill")
    }

    /// Ask the process to flush diagnostic counters without stopping it.
    pub fn flush_diagnostics(&mut self) -> Result<(), ProcessControlError> {
        let running = self.running.as_mut().ok_or(ProcessControlError::NoProcess {
            operation: "flush diagnostics",
        })?;
        let pid = running.child.pid();
        tracing::debug!("signaling diagnostics flush to {}", pid);
        running
            .child
            .send_signal(Signal::Usr1)
            .map_err(|source| ProcessControlError::Signal {
                signal: Signal::Usr1.name(),
                pid,
                source,
            })
    }

    fn stop(
        &mut self,
        signal: Signal,
        operation: &'static str,
    ) -> Result<ExitReport, ProcessControlError> {
        let mut running = self
            .running
            .take()
            .ok_or(ProcessControlError::NoProcess { operation })?;
        let pid = running.child.pid();

        tracing::info!("reading remaining data from subprocess");
        if let Err(e) = running.reader.drain() {
            tracing::warn!("draining subprocess output failed: {}", e);
        }

        let exited = match running.child.try_wait() {
            Ok(status) => status,
            Err(source) => {
                self.running = Some(running);
                return Err(ProcessControlError::Reap { pid, source });
            }
        };

        if exited.is_none() {
            tracing::debug!("sending {} to subprocess {}", signal.name(), pid);
            if let Err(source) = running.child.send_signal(signal) {
                self.running = Some(running);
                return Err(ProcessControlError::Signal {
                    signal: signal.name(),
                    pid,
                    source,
                });
            }
        }

        tracing::debug!("waiting for the subprocess to die");
        let status = match exited {
            Some(status) => Ok(status),
            None => reap(&mut running),
        };
        let status = match status {
            Ok(status) => status,
            Err(source) => {
                self.running = Some(running);
                return Err(ProcessControlError::Reap { pid, source });
            }
        };

        if let Err(e) = running.reader.drain() {
            tracing::warn!("draining subprocess output failed: {}", e);
        }

        self.mirror = running.reader.take_mirror();
        let report = ExitReport::from(status);
        tracing::info!("subprocess {} stopped ({})", pid, report);
        self.last_exit = Some(report);
        Ok(report)
    }
}

/// Wait for exit while keeping the pipe drained so the child cannot block
/// on a full pipe during shutdown.
fn reap<C: ChildHandle, S: OutputStream>(running: &mut Running<C, S>) -> io::Result<ExitStatus> {
    loop {
        if let Some(status) = running.child.try_wait()? {
            return Ok(status);
        }
        if running.reader.is_closed() {
            return running.child.wait();
        }
        if let Err(e) = running
            .reader
            .read_available(READ_CHUNK_SIZE, REAP_POLL_INTERVAL)
        {
            tracing::warn!("reading subprocess output failed: {}", e);
            return running.child.wait();
        }
    }
}

impl<C: ChildHandle, S: OutputStream> Drop for ProcessMonitor<C, S> {
    fn drop(&mut self) {
        if let Some(running) = self.running.as_mut() {
            if let Ok(None) = running.child.try_wait() {
                let _ = running.child.send_signal(Signal::Kill);
                let _ = running.child.wait();
            }
        }
    }
}
