//! Bounded raw console text

/// Append-only string that drops its oldest characters past a bound
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
    /// Character count of `text`, kept in sync to avoid rescanning
    chars: usize,
    max_chars: usize,
}

impl TextBuffer {
    pub fn new(max_chars: usize) -> Self {
        Self {
            text: String::new(),
            chars: 0,
            max_chars,
        }
    }

    pub fn push_str(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        self.text.push_str(s);
        self.chars += s.chars().count();
        self.trim();
    }

    /// Append a line followed by a newline
    pub fn push_line(&mut self, line: &str) {
        self.push_str(line);
        self.push_str("\n");
    }

    /// Change the bound, trimming immediately if it shrank
    pub fn set_max_chars(&mut self, max_chars: usize) {
        self.max_chars = max_chars;
        self.trim();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn char_count(&self) -> usize {
        self.chars
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn trim(&mut self) {
        if self.chars <= self.max_chars {
            return;
        }
        let excess = self.chars - self.max_chars;
        let cut = self
            .text
            .char_indices()
            .nth(excess)
            .map(|(idx, _)| idx)
            .unwrap_or(self.text.len());
        self.text.drain(..cut);
        self.chars -= excess;
    }
}
