use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Diagnostic copy of everything read from a child.
///
/// Writes are best-effort: a failing sink is logged once and then
/// disabled, it never interrupts capturing into the buffer.
pub struct MirrorSink {
    target: Box<dyn Write + Send>,
    failed: bool,
}

impl MirrorSink {
    pub fn new(target: impl Write + Send + 'static) -> Self {
        Self {
            target: Box::new(target),
            failed: false,
        }
    }

    /// Truncate or create `path` and mirror into it.
    pub fn create_file(path: &Path) -> io::Result<Self> {
        Ok(Self::new(File::create(path)?))
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    pub fn write_chunk(&mut self, chunk: &[u8]) {
        if self.failed {
            return;
        }
        let result = self
            .target
            .write_all(chunk)
            .and_then(|()| self.target.flush());
        if let Err(e) = result {
            tracing::warn!("mirror sink write failed, disabling mirror: {}", e);
            self.failed = true;
        }
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }
}

impl std::fmt::Debug for MirrorSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorSink")
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}
