use std::sync::Arc;

use parking_lot::Mutex;

/// Lines of the caption that is currently active on the lyric track.
#[derive(Default)]
pub struct LyricState {
    inner: Mutex<LyricInner>,
}

#[derive(Default)]
struct LyricInner {
    lines: Arc<Vec<String>>,
    revision: u64,
}

impl LyricState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the lines wholesale.
    pub fn set_lines(&self, lines: Vec<String>) {
        let mut inner = self.inner.lock();
        inner.lines = Arc::new(lines);
        inner.revision += 1;
    }

    pub fn clear(&self) {
        self.set_lines(Vec::new());
    }

    pub fn lines(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.inner.lock().lines)
    }

    /// Incremented on every replacement, so pollers can skip unchanged frames.
    pub fn revision(&self) -> u64 {
        self.inner.lock().revision
    }
}
