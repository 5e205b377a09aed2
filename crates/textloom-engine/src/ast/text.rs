//! UTF-16 offset arithmetic over Rust (UTF-8) strings.
//!
//! All offsets crossing the engine boundary are UTF-16 code units, because the
//! editing surface this engine backs measures text that way. Rust strings are
//! UTF-8, so every offset has to be translated before slicing. Helpers here
//! clamp rather than panic: an out-of-range offset snaps to the nearest valid
//! position, and an offset landing inside a surrogate pair snaps to the start
//! of that character.

/// Length of a string in UTF-16 code units.
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Convert a UTF-16 code-unit offset to a byte index into `s`, clamped to
/// `s.len()`.
pub fn byte_index(s: &str, utf16_offset: usize) -> usize {
    let mut units = 0;
    for (byte_idx, ch) in s.char_indices() {
        if units >= utf16_offset {
            return byte_idx;
        }
        units += ch.len_utf16();
    }
    s.len()
}

/// Clamp a UTF-16 offset to the length of `s`, snapping offsets that land in
/// the middle of a surrogate pair back to the character boundary.
pub fn clamp_offset(s: &str, utf16_offset: usize) -> usize {
    let len = utf16_len(s);
    if utf16_offset >= len {
        return len;
    }
    let mut units = 0;
    for ch in s.chars() {
        let w = ch.len_utf16();
        if units + w > utf16_offset {
            return units;
        }
        units += w;
    }
    len
}

/// Slice `s` between two UTF-16 offsets. Offsets are clamped; a reversed pair
/// yields the empty string.
pub fn slice(s: &str, start: usize, end: usize) -> &str {
    if end <= start {
        return "";
    }
    let b_start = byte_index(s, start);
    let b_end = byte_index(s, end);
    if b_end <= b_start {
        return "";
    }
    &s[b_start..b_end]
}

/// Replace the UTF-16 range `start..end` of `s` with `replacement`.
pub fn splice(s: &str, start: usize, end: usize, replacement: &str) -> String {
    let b_start = byte_index(s, start);
    let b_end = byte_index(s, end.max(start));
    let mut out = String::with_capacity(s.len() + replacement.len());
    out.push_str(&s[..b_start]);
    out.push_str(replacement);
    out.push_str(&s[b_end.max(b_start)..]);
    out
}
