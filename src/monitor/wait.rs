use std::time::{Duration, Instant};

use crate::monitor::error::MonitorError;
use crate::monitor::reader::{OutputReader, ReadOutcome, READ_CHUNK_SIZE};
use crate::monitor::stream::OutputStream;

/// Below this much remaining budget an empty poll counts as a timeout.
const DEADLINE_SLACK: Duration = Duration::from_millis(1);

/// A single "wait until `pattern` was seen `count` times" request.
#[derive(Debug, Clone)]
pub struct MatchRequest<'a> {
    pub pattern: &'a str,
    pub count: usize,
    pub deadline: Instant,
}

impl<'a> MatchRequest<'a> {
    pub fn new(pattern: &'a str, count: usize, timeout: Duration) -> Self {
        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or(now + Duration::from_secs(86_400 * 365));
        Self {
            pattern,
            count,
            deadline,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    fn timed_out(&self) -> MonitorError {
        MonitorError::MatchTimeout {
            pattern: self.pattern.to_string(),
            count: self.count,
        }
    }

    fn premature_exit(&self) -> MonitorError {
        MonitorError::PrematureExit {
            pattern: self.pattern.to_string(),
            count: self.count,
        }
    }
}

impl<S: OutputStream> OutputReader<S> {
    /// Block until `pattern` has appeared at least `count` times.
    ///
    /// Output already captured is checked first; if it satisfies the
    /// request no poll or read is performed. Otherwise the stream is polled
    /// with the remaining budget and every chunk read is appended before
    /// re-checking.
    ///
    /// Fails with [`MonitorError::MatchTimeout`] once the deadline passed,
    /// [`MonitorError::PrematureExit`] when the stream closes first, and
    /// [`MonitorError::Wait`] when a poll returns early without the stream
    /// being readable or the OS reports an error.
    pub fn wait_for(
        &mut self,
        pattern: &str,
        timeout: Duration,
        count: usize,
    ) -> Result<(), MonitorError> {
        if self.buffer().contains_at_least(pattern, count) {
            tracing::debug!("match found, returning without reading more data");
            return Ok(());
        }

        let request = MatchRequest::new(pattern, count, timeout);
        loop {
            let remaining = request.remaining();
            tracing::debug!(
                "waiting for data output by subprocess (remaining time to timeout = {:?})",
                remaining
            );

            let readable = self
                .poll(remaining)
                .map_err(|e| MonitorError::wait_io("select failed", e))?;

            if !readable {
                if request.remaining() < DEADLINE_SLACK {
                    return Err(request.timed_out());
                }
                return Err(MonitorError::Wait {
                    reason: "select returned without the output stream being readable"
                        .to_string(),
                    source: None,
                });
            }

            match self
                .read_ready(READ_CHUNK_SIZE)
                .map_err(|e| MonitorError::wait_io("read failed", e))?
            {
                ReadOutcome::Closed => return Err(request.premature_exit()),
                ReadOutcome::Data(_) | ReadOutcome::Pending => {}
            }

            tracing::debug!("testing again for {}x '{}' in buffer", count, pattern);
            if self.buffer().contains_at_least(pattern, count) {
                tracing::debug!("match found, returning");
                return Ok(());
            }
        }
    }
}
