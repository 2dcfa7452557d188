//! Length-bounded transcript accumulation.
//!
//! Transcript fragments arrive in unpredictable sizes, so the shared state
//! holds them in a growable string with a hard character cap. Appends that
//! would exceed the cap are silently cut at a UTF-8 character boundary;
//! excess text is dropped, never wrapped.

/// Growable text buffer with a hard cap on character count.
#[derive(Debug, Clone)]
pub struct BoundedText {
    buf: String,
    chars: usize,
    max_chars: usize,
    truncated: bool,
}

impl BoundedText {
    pub fn new(max_chars: usize) -> Self {
        Self {
            buf: String::new(),
            chars: 0,
            max_chars,
            truncated: false,
        }
    }

    /// Append as much of `fragment` as fits, cutting at a character boundary.
    pub fn push_str(&mut self, fragment: &str) {
        let room = self.max_chars.saturating_sub(self.chars);
        if room == 0 {
            if !fragment.is_empty() {
                self.truncated = true;
            }
            return;
        }
        let kept = prefix_chars(fragment, room);
        self.buf.push_str(kept);
        self.chars += kept.chars().count();
        if kept.len() < fragment.len() {
            self.truncated = true;
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Reset for the next utterance. Also clears the truncation marker.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.chars = 0;
        self.truncated = false;
    }

    /// Whether any append has dropped text since the last clear.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

/// Prefix of `s` holding at most `max_chars` characters. Never splits a
/// multi-byte character.
fn prefix_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_within_cap() {
        let mut text = BoundedText::new(10);
        text.push_str("hello");
        text.push_str(" you");
        assert_eq!(text.as_str(), "hello you");
        assert!(!text.truncated());
    }

    #[test]
    fn overflow_is_cut_not_wrapped() {
        let mut text = BoundedText::new(6);
        text.push_str("hello");
        text.push_str(" world");
        assert_eq!(text.as_str(), "hello ");
        assert!(text.truncated());
        // Further appends are dropped entirely.
        text.push_str("more");
        assert_eq!(text.as_str(), "hello ");
    }

    #[test]
    fn cut_respects_utf8_boundaries() {
        let mut text = BoundedText::new(3);
        text.push_str("héllo");
        assert_eq!(text.as_str(), "hél");
        assert!(text.truncated());
    }

    #[test]
    fn clear_resets_cap_and_marker() {
        let mut text = BoundedText::new(4);
        text.push_str("abcdef");
        assert!(text.truncated());
        text.clear();
        assert!(text.is_empty());
        assert!(!text.truncated());
        text.push_str("wxyz");
        assert_eq!(text.as_str(), "wxyz");
        assert!(!text.truncated());
    }

    #[test]
    fn empty_append_at_cap_is_not_truncation() {
        let mut text = BoundedText::new(2);
        text.push_str("ab");
        text.push_str("");
        assert!(!text.truncated());
    }

    #[test]
    fn zero_cap_accepts_nothing() {
        let mut text = BoundedText::new(0);
        text.push_str("a");
        assert!(text.is_empty());
        assert!(text.truncated());
    }
}
