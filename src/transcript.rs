//! # Transcript Aggregator
//!
//! Collects recognized text fragments in arrival order into the session's
//! running transcript. Insertion order is the chronological order of the
//! meeting, so fragments are only ever appended, never reordered.

use std::sync::Mutex;

/// Collapse whitespace runs to single spaces and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ordered collection of transcript fragments for one recording.
///
/// ## Thread Safety:
/// Interior `Mutex` so the transcription worker appends while a summarize
/// task snapshots concurrently.
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    fragments: Mutex<Vec<String>>,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a recognized fragment.
    ///
    /// The fragment is trimmed first; empty results (silence windows) are
    /// dropped without touching the transcript. Returns the stored fragment
    /// when one was appended, for immediate event emission.
    pub fn append(&self, text: &str) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let fragment = trimmed.to_string();
        self.fragments.lock().unwrap().push(fragment.clone());
        Some(fragment)
    }

    /// Whitespace-normalized concatenation of all fragments in order.
    pub fn snapshot(&self) -> String {
        let fragments = self.fragments.lock().unwrap();
        normalize_whitespace(&fragments.join(" "))
    }

    /// Number of fragments collected so far.
    pub fn len(&self) -> usize {
        self.fragments.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all fragments (new recording).
    pub fn clear(&self) {
        self.fragments.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  bonjour   à  tous \n"), "bonjour à tous");
        assert_eq!(normalize_whitespace(""), "");
        assert_eq!(normalize_whitespace(" \t \n "), "");
    }

    #[test]
    fn test_append_trims_and_returns_fragment() {
        let transcript = TranscriptAggregator::new();
        assert_eq!(
            transcript.append("  hello world  ").as_deref(),
            Some("hello world")
        );
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn test_empty_fragments_are_dropped() {
        let transcript = TranscriptAggregator::new();
        assert!(transcript.append("").is_none());
        assert!(transcript.append("   \t ").is_none());
        assert!(transcript.is_empty());
    }

    #[test]
    fn test_snapshot_preserves_order_and_normalizes() {
        let transcript = TranscriptAggregator::new();
        transcript.append("première  phrase");
        transcript.append("deuxième phrase");
        transcript.append("troisième");

        assert_eq!(
            transcript.snapshot(),
            "première phrase deuxième phrase troisième"
        );
    }

    #[test]
    fn test_snapshot_of_empty_transcript() {
        let transcript = TranscriptAggregator::new();
        assert_eq!(transcript.snapshot(), "");
    }

    #[test]
    fn test_clear() {
        let transcript = TranscriptAggregator::new();
        transcript.append("quelque chose");
        transcript.clear();
        assert!(transcript.is_empty());
        assert_eq!(transcript.snapshot(), "");
    }
}
