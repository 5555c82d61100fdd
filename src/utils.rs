// src/utils.rs
use std::collections::HashSet;

/// Normalize question text for use as a store key: newlines stripped,
/// runs of whitespace collapsed, ends trimmed. Casing is preserved so
/// exact lookups stay faithful to what the form showed.
pub fn normalize_question(question: &str) -> String {
    question.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Character-set Jaccard similarity on lowercased text. Whitespace/case
/// rewordings of the same question score close to 1.0.
pub fn char_set_similarity(a: &str, b: &str) -> f64 {
    let set_a: HashSet<char> = a
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let set_b: HashSet<char> = b
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Case-insensitive "either contains the other" check.
pub fn contains_either(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    a.contains(&b) || b.contains(&a)
}

/// Case-insensitive check against a keyword list.
pub fn contains_any(haystack: &str, needles: &[String]) -> bool {
    let lowered = haystack.to_lowercase();
    needles
        .iter()
        .any(|needle| !needle.is_empty() && lowered.contains(&needle.to_lowercase()))
}

/// Minimal query-string escaping for search URLs.
pub fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ' ' => out.push_str("%20"),
            '&' => out.push_str("%26"),
            '+' => out.push_str("%2B"),
            '#' => out.push_str("%23"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_question() {
        assert_eq!(
            normalize_question("Do you have\n5  years of experience?"),
            "Do you have 5 years of experience?"
        );
        assert_eq!(normalize_question("  trimmed  "), "trimmed");
    }

    #[test]
    fn test_char_set_similarity() {
        assert_eq!(char_set_similarity("abc", "abc"), 1.0);
        assert_eq!(char_set_similarity("abc", "ABC"), 1.0);
        assert!(char_set_similarity("abc", "xyz") < 0.1);
        // A trailing question mark barely moves the score.
        assert!(
            char_set_similarity(
                "do you have 5 years of experience",
                "Do you have 5 years of experience?"
            ) > 0.9
        );
    }

    #[test]
    fn test_contains_either() {
        assert!(contains_either("years of experience", "Years of Experience?"));
        assert!(!contains_either("salary", "sponsor"));
    }

    #[test]
    fn test_contains_any() {
        let blacklist = vec!["Recruiting Agency".to_string()];
        assert!(contains_any("Senior Dev at recruiting agency Inc", &blacklist));
        assert!(!contains_any("Senior Dev at Acme", &blacklist));
    }

    #[test]
    fn test_urlencode() {
        assert_eq!(urlencode("San Francisco, CA"), "San%20Francisco,%20CA");
        assert_eq!(urlencode("C# developer"), "C%23%20developer");
    }
}
