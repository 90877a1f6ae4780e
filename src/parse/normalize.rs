use regex::Regex;

lazy_static::lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Collapse whitespace runs, lower-case and split into tokens.
///
/// Punctuation and non-ASCII names pass through untouched.
pub fn normalize(text: &str) -> Vec<String> {
    let collapsed = WHITESPACE.replace_all(text.trim(), " ");
    if collapsed.is_empty() {
        return Vec::new();
    }
    collapsed
        .to_lowercase()
        .split(' ')
        .map(String::from)
        .collect()
}
