use parking_lot::RwLock;

/// Append-only text captured from a monitored process.
///
/// The reader is the only writer; any number of observers may query
/// occurrence counts while appends are in progress. Nothing is ever
/// evicted, so the count for a fixed pattern never decreases.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    text: RwLock<String>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a buffer with already captured output.
    pub fn with_contents(text: impl Into<String>) -> Self {
        Self {
            text: RwLock::new(text.into()),
        }
    }

    pub fn append(&self, chunk: &str) {
        self.text.write().push_str(chunk);
    }

    /// Count non-overlapping literal occurrences of `pattern`.
    ///
    /// An empty pattern never matches.
    pub fn count_occurrences(&self, pattern: &str) -> usize {
        if pattern.is_empty() {
            return 0;
        }
        self.text.read().matches(pattern).count()
    }

    /// `true` once `pattern` has been seen at least `count` times.
    pub fn contains_at_least(&self, pattern: &str, count: usize) -> bool {
        self.count_occurrences(pattern) >= count
    }

    pub fn snapshot(&self) -> String {
        self.text.read().clone()
    }

    pub fn len(&self) -> usize {
        self.text.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.read().is_empty()
    }
}
