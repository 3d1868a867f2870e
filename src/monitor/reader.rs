use std::sync::Arc;
use std::time::Duration;

use crate::monitor::buffer::OutputBuffer;
use crate::monitor::mirror::MirrorSink;
use crate::monitor::stream::OutputStream;

/// Largest chunk taken from the stream in one read.
pub const READ_CHUNK_SIZE: usize = 2000;

/// Result of a single poll-then-read step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were read and appended.
    Data(usize),
    /// Nothing became readable within the poll timeout.
    Pending,
    /// The stream was readable but returned no bytes: the writer is gone.
    Closed,
}

/// Pulls output from a stream into the shared buffer and the mirror.
///
/// All reads happen on the caller's thread; the only place a call can
/// suspend is the readiness poll.
pub struct OutputReader<S> {
    stream: S,
    buffer: Arc<OutputBuffer>,
    mirror: Option<MirrorSink>,
    /// Trailing bytes of a UTF-8 sequence cut off by the last read.
    partial: Vec<u8>,
    closed: bool,
}

impl<S: OutputStream> OutputReader<S> {
    pub fn new(stream: S, buffer: Arc<OutputBuffer>, mirror: Option<MirrorSink>) -> Self {
        Self {
            stream,
            buffer,
            mirror,
            partial: Vec::new(),
            closed: false,
        }
    }

    pub fn buffer(&self) -> &Arc<OutputBuffer> {
        &self.buffer
    }

    /// `true` once end-of-stream has been observed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Poll for up to `poll_timeout`, then read at most `max_bytes`.
    pub fn read_available(
        &mut self,
        max_bytes: usize,
        poll_timeout: Duration,
    ) -> std::io::Result<ReadOutcome> {
        if !self.poll(poll_timeout)? {
            return Ok(ReadOutcome::Pending);
        }
        self.read_ready(max_bytes)
    }

    pub(crate) fn poll(&mut self, timeout: Duration) -> std::io::Result<bool> {
        self.stream.poll_readable(timeout)
    }

    /// Hand back the mirror so a later run can keep writing to it.
    pub(crate) fn take_mirror(&mut self) -> Option<MirrorSink> {
        self.mirror.take()
    }

    #[cfg(test)]
    pub(crate) fn stream_ref(&self) -> &S {
        &self.stream
    }

    /// Read after readiness has already been confirmed.
    pub(crate) fn read_ready(&mut self, max_bytes: usize) -> std::io::Result<ReadOutcome> {
        let mut chunk = vec![0u8; max_bytes.max(1)];
        let n = self.stream.read_chunk(&mut chunk)?;
        if n == 0 {
            tracing::debug!("subprocess output closed");
            self.closed = true;
            if !self.partial.is_empty() {
                let rest = std::mem::take(&mut self.partial);
                self.buffer.append(&String::from_utf8_lossy(&rest));
            }
            return Ok(ReadOutcome::Closed);
        }

        let chunk = &chunk[..n];
        tracing::debug!("read {} bytes, appending to buffer", n);
        if let Some(mirror) = self.mirror.as_mut() {
            mirror.write_chunk(chunk);
        }
        self.partial.extend_from_slice(chunk);
        let mut text = String::with_capacity(self.partial.len());
        let consumed = decode_utf8(&self.partial, &mut text);
        self.partial.drain(..consumed);
        if !text.is_empty() {
            self.buffer.append(&text);
        }
        Ok(ReadOutcome::Data(n))
    }

    /// Read everything that is pending right now without waiting.
    ///
    /// Returns the number of bytes captured. Stops at the first poll that
    /// reports nothing readable or at end-of-stream.
    pub fn drain(&mut self) -> std::io::Result<usize> {
        if self.closed {
            return Ok(0);
        }
        let mut total = 0;
        loop {
            match self.read_available(READ_CHUNK_SIZE, Duration::ZERO)? {
                ReadOutcome::Data(n) => total += n,
                ReadOutcome::Pending | ReadOutcome::Closed => return Ok(total),
            }
        }
    }
}

/// Decode `bytes` into `out`, replacing invalid sequences with U+FFFD.
///
/// An incomplete sequence at the very end is left undecoded; the number of
/// bytes consumed is returned.
fn decode_utf8(mut bytes: &[u8], out: &mut String) -> usize {
    let total = bytes.len();
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return total;
            }
            Err(err) => {
                let (valid, rest) = bytes.split_at(err.valid_up_to());
                out.push_str(&String::from_utf8_lossy(valid));
                match err.error_len() {
                    Some(len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        bytes = &rest[len..];
                    }
                    None => return total - rest.len(),
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{ScriptedStream, Step};
    use super::*;
    use parking_lot::Mutex;
    use std::io::{self, Write};

    #[derive(Clone, Default)]
    struct Spy(Arc<Mutex<Vec<u8>>>);

    impl Write for Spy {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn reader(steps: Vec<Step>, mirror: Option<MirrorSink>) -> OutputReader<ScriptedStream> {
        OutputReader::new(
            ScriptedStream::new(steps),
            Arc::new(OutputBuffer::new()),
            mirror,
        )
    }

    #[test]
    fn data_is_appended_and_mirrored() {
        let spy = Spy::default();
        let mut reader = reader(vec![Step::Chunk(b"hello ")], Some(MirrorSink::new(spy.clone())));

        let outcome = reader.read_available(READ_CHUNK_SIZE, Duration::ZERO).unwrap();

        assert_eq!(outcome, ReadOutcome::Data(6));
        assert_eq!(reader.buffer().snapshot(), "hello ");
        assert_eq!(spy.0.lock().as_slice(), b"hello ");
    }

    #[test]
    fn nothing_ready_is_pending_without_read() {
        let mut reader = reader(vec![Step::Idle], None);
        let outcome = reader.read_available(READ_CHUNK_SIZE, Duration::from_millis(5)).unwrap();
        assert_eq!(outcome, ReadOutcome::Pending);
        assert_eq!(reader.stream.reads, 0);
        assert_eq!(reader.stream.polls, vec![Duration::from_millis(5)]);
    }

    #[test]
    fn readable_but_empty_is_closed() {
        let mut reader = reader(vec![Step::Chunk(b"")], None);
        let outcome = reader.read_available(READ_CHUNK_SIZE, Duration::ZERO).unwrap();
        assert_eq!(outcome, ReadOutcome::Closed);
        assert!(reader.is_closed());
        assert!(reader.buffer().is_empty());
    }

    #[test]
    fn read_is_capped_at_max_bytes() {
        let mut reader = reader(vec![Step::Chunk(b"abcdef")], None);
        let outcome = reader.read_available(4, Duration::ZERO).unwrap();
        assert_eq!(outcome, ReadOutcome::Data(4));
        assert_eq!(reader.buffer().snapshot(), "abcd");
    }

    #[test]
    fn invalid_utf8_is_replaced_in_buffer_but_verbatim_in_mirror() {
        let spy = Spy::default();
        let mut reader = reader(vec![Step::Chunk(b"ok\xff")], Some(MirrorSink::new(spy.clone())));
        reader.read_available(READ_CHUNK_SIZE, Duration::ZERO).unwrap();
        assert_eq!(reader.buffer().snapshot(), "ok\u{fffd}");
        assert_eq!(spy.0.lock().as_slice(), b"ok\xff");
    }

    #[test]
    fn character_split_across_reads_is_joined() {
        let mut reader = reader(vec![Step::Chunk(b"a\xc3"), Step::Chunk(b"\xa9 b")], None);
        reader.read_available(READ_CHUNK_SIZE, Duration::ZERO).unwrap();
        assert_eq!(reader.buffer().snapshot(), "a");
        reader.read_available(READ_CHUNK_SIZE, Duration::ZERO).unwrap();
        assert_eq!(reader.buffer().snapshot(), "a\u{e9} b");
    }

    #[test]
    fn invalid_byte_before_split_character_is_replaced_once() {
        let mut reader = reader(
            vec![Step::Chunk(b"x\xffy\xe2\x82"), Step::Chunk(b"\xac")],
            None,
        );
        reader.drain().unwrap();
        assert_eq!(reader.buffer().snapshot(), "x\u{fffd}y\u{20ac}");
    }

    #[test]
    fn unfinished_character_is_flushed_at_end_of_stream() {
        let mut reader = reader(vec![Step::Chunk(b"end\xe2\x82"), Step::Chunk(b"")], None);
        reader.drain().unwrap();
        assert!(reader.is_closed());
        assert_eq!(reader.buffer().snapshot(), "end\u{fffd}");
    }

    #[test]
    fn drain_reads_until_nothing_pending() {
        let mut reader = reader(
            vec![Step::Chunk(b"one "), Step::Chunk(b"two "), Step::Idle, Step::Chunk(b"late")],
            None,
        );
        assert_eq!(reader.drain().unwrap(), 8);
        assert_eq!(reader.buffer().snapshot(), "one two ");
        assert!(reader.stream.polls.iter().all(|t| t.is_zero()));
    }

    #[test]
    fn drain_stops_at_end_of_stream() {
        let mut reader = reader(vec![Step::Chunk(b"bye"), Step::Chunk(b"")], None);
        assert_eq!(reader.drain().unwrap(), 3);
        assert!(reader.is_closed());
        assert_eq!(reader.drain().unwrap(), 0);
    }

    #[test]
    fn mirror_failure_does_not_affect_buffer() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut reader = reader(
            vec![Step::Chunk(b"first "), Step::Chunk(b"second")],
            Some(MirrorSink::new(Broken)),
        );
        reader.drain().unwrap();
        assert_eq!(reader.buffer().snapshot(), "first second");
    }
}
