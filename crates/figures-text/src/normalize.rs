//! Saying cleanup and canonical comparison form.
//!
//! `sanitize` produces the text shown to viewers. `canonicalize` produces the
//! comparison form: cosmetically different renderings of the same saying
//! (spacing, bracket style, full-width forms, katakana vs hiragana) collapse
//! to one string. The canonical form is never shown to users.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Bracket and parenthesis characters stripped during sanitization
/// (ASCII, full-width and CJK corner/angle/lenticular forms).
static BRACKETS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[（）()［］\[\]｛｝{}「」『』〈〉《》【】＜＞〔〕〘〙〚〛⟨⟩〈〉]")
        .expect("bracket pattern is valid")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Anything outside the Letter and Number general categories, combining
/// marks included.
static NON_LETTER_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("category pattern is valid"));

// Katakana block range that has a hiragana counterpart 0x60 code points below.
const KATAKANA_START: u32 = 0x30A1;
const KATAKANA_END: u32 = 0x30F6;
const KATAKANA_OFFSET: u32 = 0x60;

/// Strip brackets, collapse whitespace runs to a single space and trim.
///
/// Never fails; input that becomes empty yields an empty string.
pub fn sanitize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let without_brackets = BRACKETS.replace_all(raw, "");
    let collapsed = WHITESPACE.replace_all(&without_brackets, " ");
    collapsed.trim().to_string()
}

/// Map a katakana letter onto its hiragana pair; everything else passes through.
fn fold_kana(ch: char) -> char {
    let code = ch as u32;
    if (KATAKANA_START..=KATAKANA_END).contains(&code) {
        char::from_u32(code - KATAKANA_OFFSET).unwrap_or(ch)
    } else {
        ch
    }
}

/// Canonical comparison form: NFKC, kana folding, letters and digits only,
/// lower-cased.
///
/// Pure, deterministic and total. Idempotent:
/// `canonicalize(&canonicalize(s)) == canonicalize(s)`.
pub fn canonicalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let folded: String = text.nfkc().map(fold_kana).collect();
    let letters = NON_LETTER_DIGIT.replace_all(&folded, "");
    // Lower-casing can emit sequences NFKC would rewrite (e.g. expanded
    // special casings), so normalize once more to stay a fixed point.
    let lowered: String = letters.to_lowercase().nfkc().collect();
    NON_LETTER_DIGIT.replace_all(&lowered, "").into_owned()
}

/// SHA-256 of the canonical form, rendered as 64 lowercase hex characters.
pub fn fingerprint(text: &str) -> String {
    fingerprint_canonical(&canonicalize(text))
}

/// Hash an already-canonical string without re-canonicalizing it.
pub fn fingerprint_canonical(canonical: &str) -> String {
    let digest = Sha256::digest(canonical.as_bytes());
    format!("{:x}", digest)
}

/// A sanitized candidate together with its comparison keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateText {
    /// Human-facing text, as it will be stored
    pub text: String,
    /// Canonical comparison form
    pub canonical: String,
    /// Hash of `canonical`
    pub fingerprint: String,
}

impl CandidateText {
    /// Derive comparison keys for already-sanitized text.
    ///
    /// Returns `None` when nothing comparable remains after canonicalization
    /// (e.g. the text was punctuation only).
    pub fn from_sanitized(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        let canonical = canonicalize(&text);
        if canonical.is_empty() {
            return None;
        }
        let fingerprint = fingerprint_canonical(&canonical);
        Some(Self {
            text,
            canonical,
            fingerprint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_trims_and_collapses() {
        assert_eq!(sanitize(" （ 信念 ） を    つらぬく "), "信念 を つらぬく");
        assert_eq!(sanitize("「志」を\t\n磨け"), "志を 磨け");
        assert_eq!(sanitize("[Stay] (hungry)"), "Stay hungry");
    }

    #[test]
    fn test_sanitize_empty_inputs() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("   "), "");
        assert_eq!(sanitize("（）【】"), "");
    }

    #[test]
    fn test_canonicalize_nfkc_and_katakana() {
        assert_eq!(canonicalize("ガッコウ"), "がっこう");
        // Half-width katakana goes through NFKC first.
        assert_eq!(canonicalize("ｶﾞｯｺｳ"), "がっこう");
        assert_eq!(canonicalize("ＡＢＣ１２３"), "abc123");
    }

    #[test]
    fn test_canonicalize_strips_non_alphanumerics() {
        assert_eq!(canonicalize("志を、磨け！"), "志を磨け");
        assert_eq!(canonicalize("Stay hungry, stay foolish."), "stayhungrystayfoolish");
        assert_eq!(canonicalize("!!! ..."), "");
    }

    #[test]
    fn test_canonicalize_drops_combining_marks() {
        // Devanagari vowel sign I is a spacing mark, not a letter.
        assert_eq!(canonicalize("कि"), "क");
        assert_eq!(canonicalize("नमस्ते"), "नमसत");
        // Marks that NFKC composes into a letter survive as that letter.
        assert_eq!(canonicalize("cafe\u{301}"), "café");
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        for sample in [
            "ガッコウ",
            "Stay hungry, stay foolish.",
            "İstanbul ﬁre",
            "（信念）を　つらぬく",
            "ＡＢＣ１２３",
            "",
        ] {
            let once = canonicalize(sample);
            assert_eq!(canonicalize(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_fingerprint_consistency() {
        assert_eq!(fingerprint("志を磨け"), fingerprint("志を  磨け"));
        assert_eq!(fingerprint("「志を磨け」"), fingerprint("志を磨け。"));
        assert_ne!(fingerprint("志を磨け"), fingerprint("心を磨け"));
    }

    #[test]
    fn test_fingerprint_is_fixed_width_hex() {
        let fp = fingerprint("anything");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        // Empty canonical form still hashes.
        assert_eq!(fingerprint("").len(), 64);
    }

    #[test]
    fn test_candidate_text() {
        let candidate = CandidateText::from_sanitized("志を 磨け").unwrap();
        assert_eq!(candidate.text, "志を 磨け");
        assert_eq!(candidate.canonical, "志を磨け");
        assert_eq!(candidate.fingerprint, fingerprint("志を磨け"));

        assert!(CandidateText::from_sanitized("。。。").is_none());
    }
}
