//! Word tokenization shared by query scoring and shard filters.

use std::collections::HashSet;

/// Lowercased alphanumeric tokens of `text`, in order, duplicates kept.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Tokens as a set, for overlap scoring.
pub fn tokenize_to_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Fraction of `query` tokens present in `content` tokens.
///
/// Mirrors keyword-overlap scoring: 1.0 when every query word appears,
/// 0.0 when none do.
pub fn overlap_score(query: &HashSet<String>, content: &HashSet<String>) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let matched = query.iter().filter(|t| content.contains(*t)).count();
    matched as f64 / query.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_splits_on_punctuation() {
        assert_eq!(
            tokenize("API key rotates monthly."),
            vec!["api", "key", "rotates", "monthly"]
        );
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("  ...  ").is_empty());
    }

    #[test]
    fn test_overlap_full_and_partial() {
        let content = tokenize_to_set("the api key rotates monthly");
        assert_eq!(overlap_score(&tokenize_to_set("api key"), &content), 1.0);
        assert_eq!(overlap_score(&tokenize_to_set("api token"), &content), 0.5);
        assert_eq!(overlap_score(&tokenize_to_set("unrelated"), &content), 0.0);
    }
}
