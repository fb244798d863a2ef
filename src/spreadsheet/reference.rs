//! Conversion between A1-style cell references and 1-based (row, column) indexes.

/// Converts column letters (`A`, `Z`, `AA`, ...) to a 1-based column index.
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.bytes().all(|byte| byte.is_ascii_alphabetic()) {
        return None;
    }
    letters
        .bytes()
        .map(|byte| (byte.to_ascii_uppercase() - b'A') as usize + 1)
        .try_fold(0usize, |index, digit| index.checked_mul(26)?.checked_add(digit))
}

/// Converts a row number string to a 1-based row index.
pub(crate) fn row_to_index(number: &str) -> Option<usize> {
    number.parse::<usize>().ok().filter(|row| *row > 0)
}

/// Converts a 1-based column index to column letters.
pub fn index_to_col(col: usize) -> String {
    let mut letters = Vec::new();
    let mut remaining = col;
    while remaining > 0 {
        let digit = (remaining - 1) % 26;
        letters.push(b'A' + digit as u8);
        remaining = (remaining - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Converts 1-based (row, col) to an A1-style reference such as `C7`.
pub fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", index_to_col(col), row)
}

/// Parses an A1-style reference into 1-based (row, col); `$` anchors are ignored.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, number) = reference.split_at(split);
    Some((row_to_index(number)?, col_to_index(letters)?))
}
