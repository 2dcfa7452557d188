//! State shared between the capture thread and the foreground.
//!
//! Everything here is read and written only under the session mutex, and the
//! lock is held just long enough to copy text and flip flags, never across a
//! device read or an engine call.

use crate::text::BoundedText;

/// Mutex-protected utterance state.
///
/// At any instant observed under the lock exactly one of these holds: nothing
/// heard yet, an utterance in progress (`active` with accumulating
/// `partial`), or a finalized `result` with `active` false.
pub(crate) struct SharedState {
    /// Accumulated, not-yet-finalized text for the current utterance.
    pub(crate) partial: BoundedText,
    /// Last finalized utterance, overwritten at each finalize.
    pub(crate) result: String,
    /// True once any fragment of the current utterance has accumulated.
    pub(crate) active: bool,
    /// Set exactly once per finalize; cleared by the poll that consumes it.
    pub(crate) ready: bool,
}

impl SharedState {
    pub(crate) fn new(max_text_chars: usize) -> Self {
        Self {
            partial: BoundedText::new(max_text_chars),
            result: String::new(),
            active: false,
            ready: false,
        }
    }

    /// Fold a new fragment into the current utterance.
    pub(crate) fn append(&mut self, fragment: &str) {
        self.partial.push_str(fragment);
        self.active = true;
    }

    /// Complete the current utterance: promote `partial` to `result`, arm the
    /// consume-once ready flag, and return to the inactive state.
    pub(crate) fn finalize(&mut self) {
        self.result.clear();
        self.result.push_str(self.partial.as_str());
        self.partial.clear();
        self.ready = true;
        self.active = false;
    }
}
