//! Tokenizer - jieba-rs word segmentation
//!
//! Handles:
//! - Latin text (split on whitespace and punctuation, lowercased)
//! - CJK text (jieba search-mode segmentation)
//! - Mixed text

use jieba_rs::Jieba;
use once_cell::sync::Lazy;

/// Global jieba tokenizer instance
static JIEBA: Lazy<Jieba> = Lazy::new(Jieba::new);

/// Tokenize text into lowercase terms
pub fn tokenize(text: &str) -> Vec<String> {
    // Search mode emits both full words and their sub-words
    JIEBA
        .cut_for_search(text, true)
        .into_iter()
        .map(str::trim)
        .filter(|word| word.chars().any(char::is_alphanumeric))
        .map(str::to_lowercase)
        .collect()
}

/// Lowercase and collapse whitespace
pub fn normalize_for_search(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Check if text contains CJK characters (Chinese, Japanese, Korean)
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{4e00}'..='\u{9fff}' |  // CJK Unified Ideographs
            '\u{3400}'..='\u{4dbf}' |  // CJK Extension A
            '\u{3040}'..='\u{309f}' |  // Hiragana
            '\u{30a0}'..='\u{30ff}' |  // Katakana
            '\u{ac00}'..='\u{d7af}'    // Hangul Syllables
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_english() {
        let tokens = tokenize("Grandma's Apple Pie");
        assert!(tokens.contains(&"apple".to_string()));
        assert!(tokens.contains(&"pie".to_string()));
        assert!(tokens.iter().all(|t| t == &t.to_lowercase()));
    }

    #[test]
    fn test_tokenize_drops_punctuation_and_spaces() {
        let tokens = tokenize("  Soup, hot!  ");
        assert!(tokens.contains(&"soup".to_string()));
        assert!(tokens.contains(&"hot".to_string()));
        assert!(tokens.iter().all(|t| t.chars().all(char::is_alphanumeric)));
    }

    #[test]
    fn test_tokenize_cjk() {
        let tokens = tokenize("红烧肉 recipe");
        assert!(!tokens.is_empty());
        assert!(tokens.contains(&"recipe".to_string()));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_for_search("  Apple   PIE "), "apple pie");
    }

    #[test]
    fn test_contains_cjk() {
        assert!(contains_cjk("蛋糕"));
        assert!(!contains_cjk("cake"));
    }
}
