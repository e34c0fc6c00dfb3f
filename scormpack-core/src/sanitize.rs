//! Name Sanitizer - Filesystem-Safe Tokens
//!
//! Output is lowercase ASCII alphanumerics joined by single hyphens.

/// Token used when every candidate sanitizes to nothing.
pub const DEFAULT_PACKAGE_NAME: &str = "scorm-package";

/// Collapse every run of non-alphanumeric characters into one hyphen and
/// trim hyphens from both ends.
pub fn sanitize_name(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    out
}

/// First candidate that sanitizes to a non-empty token, else `fallback`
/// sanitized, else [`DEFAULT_PACKAGE_NAME`].
pub fn sanitize_first<'a>(candidates: impl IntoIterator<Item = &'a str>, fallback: &str) -> String {
    candidates
        .into_iter()
        .map(sanitize_name)
        .find(|s| !s.is_empty())
        .or_else(|| Some(sanitize_name(fallback)).filter(|s| !s.is_empty()))
        .unwrap_or_else(|| DEFAULT_PACKAGE_NAME.to_string())
}

/// Lowercase alphanumerics only, truncated to `max` characters.
pub fn compact_token(input: &str, max: usize) -> String {
    input
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(max)
        .collect()
}
