//! Column arithmetic over line text.
//!
//! Lines are stored as UTF-8 `String`s while columns count UTF-16 code
//! units. These helpers translate between the two; ASCII lines take a fast
//! path where both units coincide.

/// Length of `text` in UTF-16 code units
pub(crate) fn utf16_len(text: &str) -> usize {
    if text.is_ascii() {
        text.len()
    } else {
        text.encode_utf16().count()
    }
}

/// Byte offset of the UTF-16 offset `units` in `text`.
///
/// Offsets past the end clamp to `text.len()`. An offset that lands inside a
/// surrogate pair resolves to the start of that character.
pub(crate) fn utf16_to_byte(text: &str, units: usize) -> usize {
    if text.is_ascii() {
        return units.min(text.len());
    }
    let mut seen = 0;
    for (byte_index, ch) in text.char_indices() {
        let width = ch.len_utf16();
        if seen + width > units {
            return byte_index;
        }
        seen += width;
    }
    text.len()
}

/// Snap a UTF-16 offset down to the nearest character boundary.
pub(crate) fn snap_to_char_boundary(text: &str, units: usize) -> usize {
    if text.is_ascii() {
        return units.min(text.len());
    }
    let byte = utf16_to_byte(text, units);
    utf16_len(&text[..byte])
}

/// Substring between two 0-based UTF-16 offsets
pub(crate) fn utf16_slice(text: &str, start: usize, end: usize) -> &str {
    let start_byte = utf16_to_byte(text, start);
    let end_byte = utf16_to_byte(text, end).max(start_byte);
    &text[start_byte..end_byte]
}

/// Split text into lines on `\r\n`, `\r` and `\n`.
pub(crate) fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                lines.push(std::mem::take(&mut current));
            }
            '\n' => lines.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    lines.push(current);
    lines
}

/// UTF-16 offset of the first character that is not a space or tab.
pub(crate) fn first_non_whitespace_index(text: &str) -> Option<usize> {
    let mut units = 0;
    for ch in text.chars() {
        if ch != ' ' && ch != '\t' {
            return Some(units);
        }
        units += ch.len_utf16();
    }
    None
}

/// UTF-16 offset of the last character that is not a space or tab.
pub(crate) fn last_non_whitespace_index(text: &str) -> Option<usize> {
    let mut units = utf16_len(text);
    for ch in text.chars().rev() {
        units -= ch.len_utf16();
        if ch != ' ' && ch != '\t' {
            return Some(units);
        }
    }
    None
}
