//! Moderation gate — the predicate deciding whether extracted text may
//! proceed to translation.
//!
//! Pure and side-effect-free from the pipeline's perspective. The default
//! policy is a case-insensitive substring match against a configurable
//! denylist; an external moderation API fits the same contract without
//! changing the worker.

use regex::RegexSet;

/// Replaceable moderation strategy.
pub trait ModerationGate: Send + Sync {
    fn is_allowed(&self, text: &str) -> bool;
}

/// Denylist gate: rejects text containing any denylisted term,
/// case-insensitive.
pub struct DenylistGate {
    patterns: RegexSet,
}

impl DenylistGate {
    /// Compile a gate from denylist terms. Terms are matched as literal
    /// substrings.
    pub fn new<S: AsRef<str>>(terms: &[S]) -> Self {
        let patterns = terms
            .iter()
            .map(|t| format!("(?i){}", regex::escape(t.as_ref())))
            .collect::<Vec<_>>();
        let patterns = RegexSet::new(&patterns).expect("escaped terms always compile");
        Self { patterns }
    }

    /// A gate that allows everything (empty denylist).
    pub fn allow_all() -> Self {
        Self::new::<&str>(&[])
    }
}

impl ModerationGate for DenylistGate {
    fn is_allowed(&self, text: &str) -> bool {
        !self.patterns.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_is_allowed() {
        let gate = DenylistGate::new(&["bannedword1", "bannedword2"]);
        assert!(gate.is_allowed("hello world"));
    }

    #[test]
    fn denylisted_term_rejected() {
        let gate = DenylistGate::new(&["bannedword1", "bannedword2"]);
        assert!(!gate.is_allowed("this text has bannedword2 in it"));
    }

    #[test]
    fn match_is_case_insensitive() {
        let gate = DenylistGate::new(&["forbidden"]);
        assert!(!gate.is_allowed("completely FORBIDDEN content"));
    }

    #[test]
    fn substring_match_inside_words() {
        let gate = DenylistGate::new(&["ban"]);
        assert!(!gate.is_allowed("urban legends"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let gate = DenylistGate::new(&["a.b"]);
        assert!(!gate.is_allowed("contains a.b here"));
        assert!(gate.is_allowed("contains axb here"));
    }

    #[test]
    fn empty_denylist_allows_everything() {
        let gate = DenylistGate::allow_all();
        assert!(gate.is_allowed("anything at all"));
    }
}
