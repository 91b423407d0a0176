//! Hashtag extraction for user messages.

use once_cell::sync::Lazy;
use regex::Regex;

// A `#` at the start or after whitespace, followed by ASCII word characters.
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\s)#([A-Za-z0-9_]+)").unwrap());

/// Tags in occurrence order, duplicates kept.
pub fn extract_tags(text: &str) -> Vec<String> {
    TAG_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_duplicates_in_order() {
        assert_eq!(extract_tags("hi #a #b #a"), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_no_markers() {
        assert!(extract_tags("plain question?").is_empty());
        assert!(extract_tags("").is_empty());
    }

    #[test]
    fn test_requires_boundary_before_marker() {
        assert_eq!(extract_tags("#start mid#dle\n#line"), vec!["start", "line"]);
        assert!(extract_tags("issue# 42").is_empty());
    }

    #[test]
    fn test_stops_at_non_word() {
        assert_eq!(extract_tags("see #rust-lang, #til."), vec!["rust", "til"]);
    }

    #[test]
    fn test_tag_chars_are_ascii() {
        assert_eq!(extract_tags("#café au lait"), vec!["caf"]);
        assert!(extract_tags("오늘 #회고 정리").is_empty());
        assert_eq!(extract_tags("#v2_notes #ünicode"), vec!["v2_notes"]);
    }
}
