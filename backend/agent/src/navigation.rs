//! URL detection for the implicit navigation before the first iteration.

use once_cell::sync::Lazy;
use regex::Regex;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:https?://|www\.)[^\s<>()\[\]{}'`]+").expect("url pattern is valid")
});

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '"'];

/// The first URL mentioned in `text`, normalised to carry a scheme.
pub fn find_url(text: &str) -> Option<String> {
    let found = URL_PATTERN.find(text)?.as_str();
    let trimmed = found.trim_end_matches(TRAILING_PUNCTUATION);
    if trimmed.len() <= "www.".len() {
        return None;
    }
    if trimmed.to_ascii_lowercase().starts_with("www.") {
        Some(format!("https://{trimmed}"))
    } else {
        Some(trimmed.to_string())
    }
}
