//! Denylist filter for low-value memory writes.

use regex::RegexSet;
use tracing::debug;

/// Default denylist: pure meta-questions about memory itself and agent
/// self-referential denials. These carry no recall value and would
/// otherwise accumulate in every session.
const DEFAULT_PATTERNS: &[&str] = &[
    r"(?i)^\s*(what|who|when|where|why|how)\s+(do|did|does|can|could|would|will)\s+(you|i)\b[^.]*\??\s*$",
    r"(?i)\bdo\s+you\s+remember\b",
    r"(?i)^\s*(i|we)\s+(do\s+not|don't|cannot|can't)\s+(have|recall|remember|access)\b",
    r"(?i)\bas\s+an\s+ai\b",
    r"(?i)^\s*(no|none|n/a|nothing)\s*\.?\s*$",
];

/// Rejects writes whose content matches a denylist of low-value
/// patterns before they are fingerprinted or logged.
#[derive(Debug)]
pub struct NoiseFilter {
    patterns: RegexSet,
}

impl NoiseFilter {
    /// Filter with the default denylist.
    pub fn new() -> Self {
        Self::with_patterns(DEFAULT_PATTERNS.iter().copied())
            .expect("default noise patterns are valid")
    }

    /// Filter with a custom denylist. Fails on an invalid pattern.
    pub fn with_patterns<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            patterns: RegexSet::new(patterns)?,
        })
    }

    /// Whether `content` should be rejected. Blank content is always
    /// noise.
    pub fn is_noise(&self, content: &str) -> bool {
        if content.trim().is_empty() {
            return true;
        }
        let hit = self.patterns.is_match(content);
        if hit {
            debug!(event = "memory.noise_matched", content_len = content.len());
        }
        hit
    }
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_questions_rejected() {
        let filter = NoiseFilter::new();
        assert!(filter.is_noise("What do you remember about me?"));
        assert!(filter.is_noise("do you remember my API key"));
    }

    #[test]
    fn test_self_referential_denials_rejected() {
        let filter = NoiseFilter::new();
        assert!(filter.is_noise("I don't have access to previous conversations"));
        assert!(filter.is_noise("As an AI, I cannot recall past sessions"));
    }

    #[test]
    fn test_blank_content_rejected() {
        let filter = NoiseFilter::new();
        assert!(filter.is_noise(""));
        assert!(filter.is_noise("   \n  "));
        assert!(filter.is_noise("n/a"));
    }

    #[test]
    fn test_substantive_content_passes() {
        let filter = NoiseFilter::new();
        assert!(!filter.is_noise("API key rotates monthly"));
        assert!(!filter.is_noise("User prefers dark mode and vim keybindings"));
        assert!(!filter.is_noise("Deployment runs on Tuesdays; staging freeze on Mondays"));
    }

    #[test]
    fn test_custom_patterns() {
        let filter = NoiseFilter::with_patterns([r"(?i)^test\b"]).unwrap();
        assert!(filter.is_noise("test scratch line"));
        assert!(!filter.is_noise("What do you remember?"));
    }
}
