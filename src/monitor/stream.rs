use std::fs::File;
use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

/// Readable end of a child's combined output.
///
/// Readiness must be checked before every read: `read_chunk` is only
/// guaranteed not to block after `poll_readable` returned `true`.
pub trait OutputStream {
    /// Wait up to `timeout` for the stream to become readable.
    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Read whatever is available. `Ok(0)` means the writer closed.
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Pipe read end, polled with `select()`.
pub struct PipeStream {
    file: File,
}

/// Create a close-on-exec pipe.
///
/// Returns the read end wrapped as a [`PipeStream`] and the raw write end,
/// which the caller hands to the child for both stdout and stderr.
pub fn pipe() -> io::Result<(PipeStream, OwnedFd)> {
    let mut fds = [0 as RawFd; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    // Wrap immediately so both ends are closed on any early return.
    let read_end = unsafe { OwnedFd::from_raw_fd(fds[0]) };
    let write_end = unsafe { OwnedFd::from_raw_fd(fds[1]) };
    set_cloexec(read_end.as_raw_fd())?;
    set_cloexec(write_end.as_raw_fd())?;
    Ok((PipeStream::from(read_end), write_end))
}

fn set_cloexec(fd: RawFd) -> io::Result<()> {
    if unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

impl From<OwnedFd> for PipeStream {
    fn from(fd: OwnedFd) -> Self {
        Self {
            file: File::from(fd),
        }
    }
}

impl PipeStream {
    pub fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl OutputStream for PipeStream {
    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        select_readable(self.fd(), timeout)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // std::io::Read retries on EINTR
        self.file.read(buf)
    }
}

/// Wait for `fd` to become readable using `select()`.
fn select_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    if fd < 0 || fd as usize >= libc::FD_SETSIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("fd {} cannot be used with select()", fd),
        ));
    }

    let secs = timeout.as_secs().min(libc::time_t::MAX as u64);
    unsafe {
        let mut read_fds: libc::fd_set = std::mem::zeroed();
        libc::FD_ZERO(&mut read_fds);
        libc::FD_SET(fd, &mut read_fds);

        let mut tv = libc::timeval {
            tv_sec: secs as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };

        loop {
            let ret = libc::select(
                fd + 1,
                &mut read_fds,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                &mut tv,
            );
            if ret < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    // EINTR: re-init fd_set (select may have clobbered it)
                    libc::FD_ZERO(&mut read_fds);
                    libc::FD_SET(fd, &mut read_fds);
                    continue;
                }
                return Err(err);
            }
            return Ok(ret > 0 && libc::FD_ISSET(fd, &read_fds));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Instant;

    #[test]
    fn empty_pipe_is_not_readable() {
        let (mut reader, _writer) = pipe().unwrap();
        let start = Instant::now();
        assert!(!reader.poll_readable(Duration::from_millis(50)).unwrap());
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn written_bytes_are_readable() {
        let (mut reader, writer) = pipe().unwrap();
        let mut writer = File::from(writer);
        writer.write_all(b"hello").unwrap();

        assert!(reader.poll_readable(Duration::ZERO).unwrap());
        let mut buf = [0u8; 16];
        let n = reader.read_chunk(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn closed_writer_reads_as_end_of_stream() {
        let (mut reader, writer) = pipe().unwrap();
        drop(writer);

        assert!(reader.poll_readable(Duration::ZERO).unwrap());
        let mut buf = [0u8; 16];
        assert_eq!(reader.read_chunk(&mut buf).unwrap(), 0);
    }

    #[test]
    fn both_ends_are_close_on_exec() {
        let (reader, writer) = pipe().unwrap();
        for fd in [reader.fd(), writer.as_raw_fd()] {
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
            assert_ne!(flags & libc::FD_CLOEXEC, 0);
        }
    }
}
