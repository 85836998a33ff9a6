use crate::table::is_placeholder;
use crate::table::Value;

const NON_BREAKING_SPACE: char = '\u{a0}';

/// Parses one cell as a number.
///
/// Numeric cells pass through. Text has non-breaking spaces and thousands
/// commas removed and `(123)` read as `-123`; empty, placeholder, unparseable
/// and non-finite values are missing.
pub fn coerce_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => Some(*number).filter(|number| number.is_finite()),
        Value::Empty | Value::DateTime(_) => None,
        Value::Bool(_) => None,
        Value::Text(text) => coerce_text(text),
    }
}

fn coerce_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|character| *character != NON_BREAKING_SPACE && *character != ',')
        .collect();
    let mut cleaned = cleaned.trim();
    let negative = cleaned.len() > 2 && cleaned.starts_with('(') && cleaned.ends_with(')');
    if negative {
        cleaned = cleaned[1..cleaned.len() - 1].trim();
    }
    if is_placeholder(cleaned) {
        return None;
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .map(|number| if negative { -number } else { number })
}

/// Parses a column of cells, keeping positions.
pub fn coerce<'a, I>(values: I) -> Vec<Option<f64>>
where
    I: IntoIterator<Item = &'a Value>,
{
    values.into_iter().map(coerce_value).collect()
}

/// Sum of the parseable cells; missing values are skipped.
pub fn sum<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a Value>,
{
    values.into_iter().filter_map(coerce_value).sum()
}

/// Number of cells that parse as numbers.
pub fn numeric_count<'a, I>(values: I) -> usize
where
    I: IntoIterator<Item = &'a Value>,
{
    values.into_iter().filter_map(coerce_value).count()
}
