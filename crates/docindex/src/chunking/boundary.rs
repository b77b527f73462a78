//! Byte-offset helpers that respect UTF-8 character boundaries.

/// Largest char boundary `<= index`, clamped to the text length
pub(super) fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut boundary = index;
    while !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

/// Smallest char boundary `>= index`, clamped to the text length
pub(super) fn ceil_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut boundary = index;
    while !text.is_char_boundary(boundary) {
        boundary += 1;
    }
    boundary
}

/// Boundary just past the character starting at `index`
pub(super) fn next_char_boundary(text: &str, index: usize) -> usize {
    text.get(index..)
        .and_then(|rest| rest.chars().next())
        .map_or(text.len(), |character| index + character.len_utf8())
}

/// Cut position after the last occurrence of the highest-priority separator in
/// `text[start..window_end]` that lands beyond `min_cut`.
///
/// A separator whose cut would not pass `min_cut` (the end of the previous
/// chunk) is skipped in favour of the next one, so an overlapping window never
/// re-cuts at the boundary it started behind.
pub(super) fn find_separator_cut(
    text: &str,
    start: usize,
    window_end: usize,
    min_cut: usize,
    separators: &[String],
) -> Option<usize> {
    let window = text.get(start..window_end)?;
    separators.iter().find_map(|separator| {
        window
            .rfind(separator.as_str())
            .filter(|offset| *offset > 0)
            .map(|offset| start + offset + separator.len())
            .filter(|cut| *cut > min_cut)
    })
}
