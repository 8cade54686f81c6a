use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("response is read-only while dictation is active")]
    ReadOnly,
}

/// The accumulating answer to the current question
#[derive(Debug, Clone, Default)]
pub struct ResponseBuffer {
    text: String,
    dictating: bool,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transcribed fragment, space-separated from prior content.
    /// Blank fragments are ignored; returns whether anything was appended.
    pub fn append_fragment(&mut self, fragment: &str) -> bool {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return false;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
        true
    }

    /// Replace the text with a manual edit
    pub fn edit(&mut self, text: impl Into<String>) -> Result<(), BufferError> {
        if self.dictating {
            return Err(BufferError::ReadOnly);
        }
        self.text = text.into();
        Ok(())
    }

    pub fn set_dictating(&mut self, dictating: bool) {
        self.dictating = dictating;
    }

    pub fn is_dictating(&self) -> bool {
        self.dictating
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Move the text out, leaving the buffer empty
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

/// Buffer shared between the flow controller and in-flight uploads
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<ResponseBuffer>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, ResponseBuffer> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> String {
        self.lock().text().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_separates_with_single_space() {
        let mut buffer = ResponseBuffer::new();
        assert!(buffer.append_fragment("Hello"));
        assert!(buffer.append_fragment("  world "));
        assert_eq!(buffer.text(), "Hello world");
    }

    #[test]
    fn test_blank_fragment_is_ignored() {
        let mut buffer = ResponseBuffer::new();
        assert!(!buffer.append_fragment("   "));
        assert!(buffer.is_empty());
        buffer.append_fragment("one");
        assert!(!buffer.append_fragment(""));
        assert_eq!(buffer.text(), "one");
    }

    #[test]
    fn test_edit_rejected_while_dictating() {
        let mut buffer = ResponseBuffer::new();
        buffer.set_dictating(true);
        assert_eq!(buffer.edit("typed"), Err(BufferError::ReadOnly));

        // dictation still appends
        buffer.append_fragment("spoken");
        assert_eq!(buffer.text(), "spoken");

        buffer.set_dictating(false);
        buffer.edit("spoken, then corrected").unwrap();
        assert_eq!(buffer.text(), "spoken, then corrected");
    }

    #[test]
    fn test_take_resets() {
        let mut buffer = ResponseBuffer::new();
        buffer.append_fragment("answer");
        assert_eq!(buffer.take(), "answer");
        assert!(buffer.is_empty());
    }
}
