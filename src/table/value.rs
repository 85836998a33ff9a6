use chrono::NaiveDateTime;
use chrono::Timelike;
use std::fmt::Display;

/// Tokens that spreadsheets and dataframe exports use for "no value".
pub const PLACEHOLDER_TOKENS: [&str; 5] = ["", "none", "nat", "null", "nan"];

/// Returns true when the trimmed, lower-cased text is a placeholder token.
pub fn is_placeholder(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    PLACEHOLDER_TOKENS.contains(&lowered.as_str())
}

/// A single cell of a raw grid or clean table.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl Value {
    /// True for cells with no content at all (not for placeholder text).
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// True when the cell's trimmed text is empty or a placeholder token.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Text(text) => is_placeholder(text),
            Value::Number(number) => number.is_nan(),
            _ => false,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    /// Trimmed display form of the cell.
    pub fn as_text(&self) -> String {
        self.to_string().trim().to_owned()
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Bool(value) => write!(f, "{}", value),
            Value::Number(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{}", *value as i64)
            }
            Value::Number(value) => write!(f, "{}", value),
            Value::Text(value) => write!(f, "{}", value),
            Value::DateTime(value) if value.num_seconds_from_midnight() == 0 && value.nanosecond() == 0 => {
                write!(f, "{}", value.format("%Y-%m-%d"))
            }
            Value::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn display_forms() {
        assert_eq!(Value::from(100.0).to_string(), "100");
        assert_eq!(Value::from(7.5).to_string(), "7.5");
        assert_eq!(Value::from("  Digital ").as_text(), "Digital");
        assert_eq!(Value::Empty.to_string(), "");
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(Value::DateTime(date.and_hms_opt(0, 0, 0).unwrap()).to_string(), "2025-03-14");
        assert_eq!(Value::DateTime(date.and_hms_opt(8, 30, 0).unwrap()).to_string(), "2025-03-14 08:30:00");
    }

    #[test]
    fn blank_and_placeholders() {
        assert!(Value::from(" ").is_empty());
        assert!(!Value::from("null").is_empty());
        assert!(Value::from("NaT").is_blank());
        assert!(Value::from(" None ").is_blank());
        assert!(!Value::from(0.0).is_blank());
        assert!(Value::from(None::<f64>).is_blank());
    }
}
