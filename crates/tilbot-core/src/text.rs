//! Character-safe string helpers. All lengths here count `char`s, not bytes,
//! so Cyrillic and Kazakh text is never cut inside a code point.

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split `text` into ordered pieces of at most `max_chars` characters each.
/// Concatenating the pieces gives back `text`. Empty input yields no pieces.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let head = truncate_chars(rest, max_chars);
        chunks.push(head.to_string());
        rest = &rest[head.len()..];
    }
    chunks
}
