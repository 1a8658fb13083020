//! Address recovery from free-text placemark descriptions.
//!
//! Two rules, tried in order, both limited to Korean administrative suffixes:
//! a labeled match anywhere in the text, then a description that starts with an
//! address.

use regex::Regex;
use std::sync::LazyLock;

static LABELED_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:주소|address|위치)?\s*[:\s]*([가-힣]+(?:도|시|군|구)[가-힣0-9\s\-]+)")
        .expect("labeled address pattern")
});

static LEADING_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[가-힣]+(?:도|시|군|구|읍|면|동|리|로|길)[가-힣0-9\s\-]+")
        .expect("leading address pattern")
});

/// Apply both rules and return the first address found.
pub fn extract_address(description: &str) -> Option<String> {
    labeled_address(description).or_else(|| leading_address(description))
}

/// Rule 1: optional "주소"/"address"/"위치" label followed by a token ending in 도/시/군/구.
pub fn labeled_address(text: &str) -> Option<String> {
    LABELED_ADDRESS
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|a| !a.is_empty())
}

/// Rule 2: the trimmed text itself starts with an address; its first line is used.
pub fn leading_address(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if !LEADING_ADDRESS.is_match(trimmed) {
        return None;
    }
    trimmed
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|a| !a.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labeled_with_prefix() {
        assert_eq!(
            extract_address("주소: 강원도 평창군 대관령면 123").as_deref(),
            Some("강원도 평창군 대관령면 123")
        );
    }

    #[test]
    fn test_labeled_without_prefix_mid_text() {
        assert_eq!(
            extract_address("뷰 좋은 곳 서울시 마포구 망원동").as_deref(),
            Some("서울시 마포구 망원동")
        );
    }

    #[test]
    fn test_labeled_stops_at_other_characters() {
        assert_eq!(
            labeled_address("address: 제주시 애월읍 123, 바다 앞").as_deref(),
            Some("제주시 애월읍 123")
        );
    }

    #[test]
    fn test_leading_rule_for_road_names() {
        // no 도/시/군/구 token, so only the leading rule applies
        let text = "테헤란로 152\n강남 파이낸스센터";
        assert_eq!(labeled_address(text), None);
        assert_eq!(extract_address(text).as_deref(), Some("테헤란로 152"));
    }

    #[test]
    fn test_no_address() {
        assert_eq!(extract_address("Nice view, bring a jacket"), None);
        assert_eq!(extract_address(""), None);
    }

    #[test]
    fn test_suffix_without_trailing_text_is_not_an_address() {
        assert_eq!(extract_address("서울시"), None);
    }
}
