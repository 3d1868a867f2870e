//! Subprocess output monitoring.
//!
//! A [`ProcessMonitor`] launches a command with stdout and stderr joined on
//! one pipe and lets the caller block until a literal substring has been
//! printed a given number of times:
//!
//! ```text
//! pipe ──select──▶ OutputReader ──append──▶ OutputBuffer ◀── wait_for / check
//!                        └────copy────▶ MirrorSink (log file)
//! ```
//!
//! Everything runs on the calling thread; the readiness poll is the only
//! point where a call can suspend.

mod buffer;
mod error;
mod mirror;
mod process;
mod reader;
mod stream;
mod wait;

pub use buffer::OutputBuffer;
pub use error::{LaunchError, MonitorError, ProcessControlError};
pub use mirror::MirrorSink;
pub use process::{ChildHandle, ExitReport, ProcessMonitor, Signal};
pub use reader::{OutputReader, ReadOutcome, READ_CHUNK_SIZE};
pub use stream::{pipe, OutputStream, PipeStream};
pub use wait::MatchRequest;
