//! Small string helpers shared by the board client, reports and the chat channel.

/// Truncates a string to at most `max_chars` characters, adding "..." if truncated.
///
/// UTF-8 safe: counts characters, not bytes, so card names full of emoji
/// never split mid-codepoint.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    const SUFFIX: &str = "...";

    if s.len() <= max_chars || s.chars().count() <= max_chars {
        return s.to_string();
    }

    let suffix_len = SUFFIX.chars().count();
    if max_chars <= suffix_len {
        return SUFFIX.chars().take(max_chars).collect();
    }

    let truncated: String = s.chars().take(max_chars - suffix_len).collect();
    format!("{}{}", truncated, SUFFIX)
}

/// Case-insensitive "does `haystack` contain any of `needles`".
/// Empty needles never match.
pub fn contains_any_ci(haystack: &str, needles: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    needles
        .iter()
        .filter(|n| !n.is_empty())
        .any(|n| haystack.contains(&n.to_lowercase()))
}
