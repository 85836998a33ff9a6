//! Conversions between Excel-style cell references ("B7") and 0-based indexes.

/// Converts column letters to a 0-based column index: A = 0, Z = 25, AA = 26.
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.bytes().all(|byte| byte.is_ascii_alphabetic()) {
        return None;
    }
    letters
        .to_ascii_uppercase()
        .bytes()
        .map(|byte| (byte - b'A') as usize + 1)
        .reduce(|index, digit| index * 26 + digit)
        .map(|col| col - 1)
}

/// Converts a 1-based row number string to a 0-based row index.
pub(crate) fn row_to_index(number: &str) -> Option<usize> {
    number
        .parse::<usize>()
        .ok()
        .filter(|row| *row > 0)
        .map(|row| row - 1)
}

/// Splits a cell reference into (row, col) indexes.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    Some((row_to_index(digits)?, col_to_index(letters)?))
}

/// Builds an Excel-style cell reference from 0-based indexes.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    let mut letters = Vec::<u8>::new();
    let mut col = col + 1;
    while col > 0 {
        col -= 1;
        letters.push(b'A' + (col % 26) as u8);
        col /= 26;
    }
    letters.reverse();
    format!("{}{}", String::from_utf8_lossy(&letters), row + 1)
}
