//! UTF-8-safe truncation for log previews.

/// Longest prefix of `s` that is at most `max_bytes` bytes and does not
/// split a multi-byte character.
///
/// Used when logging response previews — slicing with `&s[..n]` panics if
/// `n` lands inside a character.
#[inline]
#[must_use]
pub fn preview(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
