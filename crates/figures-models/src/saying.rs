//! Saying models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::subject::SubjectId;
use crate::time::EpochMillis;

/// Prefix of every rendered sequence key.
pub const SEQUENCE_KEY_PREFIX: &str = "snip";

/// Width of the zero-padded ordinal.
pub const SEQUENCE_KEY_WIDTH: usize = 6;

/// Per-subject ordinal of a saying. Defines replay and resumption order.
///
/// Rendered zero-padded (`snip-000042`) so that lexical order of stored keys
/// matches numeric order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SequenceKey(pub u64);

impl SequenceKey {
    /// The first key of a fresh subject.
    pub const FIRST: SequenceKey = SequenceKey(1);

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> SequenceKey {
        SequenceKey(self.0.saturating_add(1))
    }

    /// Parse a stored key such as `snip-000042` or `snip#000042`.
    ///
    /// Returns `None` for anything without a trailing run of digits after the
    /// last separator.
    pub fn parse(raw: &str) -> Option<SequenceKey> {
        let digits = raw.rsplit(['-', '#']).next()?;
        if digits.is_empty() || digits.len() == raw.len() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(SequenceKey)
    }

    /// Storage key, e.g. `snip-000042`.
    pub fn render(&self) -> String {
        format!("{}-{:0width$}", SEQUENCE_KEY_PREFIX, self.0, width = SEQUENCE_KEY_WIDTH)
    }
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// One accepted, deduplicated saying. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Saying {
    /// Owning subject
    pub subject_id: SubjectId,

    /// Ordinal within the subject, as stored
    pub sequence_key: String,

    /// Sanitized, human-facing text
    pub text: String,

    /// SHA-256 hex digest of the canonical form
    pub fingerprint: String,

    /// Subject display name at acceptance time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Acceptance time
    pub created_at: EpochMillis,
}

impl Saying {
    pub fn new(
        subject_id: SubjectId,
        key: SequenceKey,
        text: impl Into<String>,
        fingerprint: impl Into<String>,
        created_at: EpochMillis,
    ) -> Self {
        Self {
            subject_id,
            sequence_key: key.render(),
            text: text.into(),
            fingerprint: fingerprint.into(),
            display_name: None,
            created_at,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Parsed ordinal of the stored key, if it is well-formed.
    pub fn parsed_key(&self) -> Option<SequenceKey> {
        SequenceKey::parse(&self.sequence_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_key_render() {
        assert_eq!(SequenceKey(1).render(), "snip-000001");
        assert_eq!(SequenceKey(123456).to_string(), "snip-123456");
        assert_eq!(SequenceKey(1234567).render(), "snip-1234567");
    }

    #[test]
    fn test_sequence_key_parse() {
        assert_eq!(SequenceKey::parse("snip-000042"), Some(SequenceKey(42)));
        assert_eq!(SequenceKey::parse("snip#000007"), Some(SequenceKey(7)));
        assert_eq!(SequenceKey::parse("snip-"), None);
        assert_eq!(SequenceKey::parse("snip-00x1"), None);
        assert_eq!(SequenceKey::parse("000042"), None);
        assert_eq!(SequenceKey::parse(""), None);
    }

    #[test]
    fn test_rendered_keys_sort_numerically() {
        let mut keys = vec![SequenceKey(10).render(), SequenceKey(9).render(), SequenceKey(100).render()];
        keys.sort();
        assert_eq!(keys, vec!["snip-000009", "snip-000010", "snip-000100"]);
    }

    #[test]
    fn test_saying_parsed_key() {
        let saying = Saying::new(SubjectId::from_ordinal(1), SequenceKey(3), "志を磨け", "abc", 0);
        assert_eq!(saying.parsed_key(), Some(SequenceKey(3)));
        assert_eq!(saying.sequence_key, "snip-000003");
    }
}
