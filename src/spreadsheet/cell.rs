use crate::spreadsheet::reference::index_to_reference;
use crate::table::Value;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::TimeDelta;
use tracing::warn;

/// Types of cell data in a worksheet part.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values (stored as 0/1)
    Boolean,
    /// Numeric values
    Number,
    /// Date/time values stored as serial numbers from the 1900 epoch
    NumberDate1900,
    /// Date/time values stored as serial numbers from the 1904 epoch
    NumberDate1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// Inline string values
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values (#N/A, #REF!, ...)
    Error,
}

impl CellType {
    fn date(is_1904: bool) -> Self {
        if is_1904 {
            Self::NumberDate1904
        } else {
            Self::NumberDate1900
        }
    }

    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "14" | "15" | "16" | "17" | "18" | "19" | "20" | "21" | "22" | "45" | "46" | "47" => {
                Some(Self::date(is_1904))
            }
            _ => None,
        }
    }

    /// Parses custom number format strings to determine cell type.
    /// Date and time tokens outside literals and colour/locale brackets mark a date format.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' | 'H' | 'h' | 'S' | 's' => is_date = true,
                _ => (),
            }
        }

        if is_date {
            Self::date(is_1904)
        } else {
            Self::Number
        }
    }
}

/// Represents a single cell in a worksheet with position, type, and raw value.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    /// Cell data type
    pub(crate) kind: CellType,
    /// Raw cell value as stored in the part
    pub(crate) value: String,
}

impl Cell {
    /// Returns the Excel-style cell reference (e.g., "A1", "B2").
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Converts the raw cell into a grid value, resolving shared strings.
    /// Unparseable numbers fall back to their text, date serials out of range
    /// stay numbers, and error cells become empty.
    pub(crate) fn to_value(&self, shared_strings: &[String]) -> Value {
        match self.kind {
            CellType::Empty | CellType::Error => Value::Empty,
            CellType::Boolean => Value::Bool(self.value == "1" || self.value.eq_ignore_ascii_case("true")),
            CellType::Number => self
                .value
                .parse::<f64>()
                .map(Value::Number)
                .unwrap_or_else(|_| Value::Text(self.value.to_owned())),
            CellType::NumberDate1900 | CellType::NumberDate1904 => match self.value.parse::<f64>() {
                Ok(serial) => serial_to_datetime(serial, self.kind == CellType::NumberDate1904)
                    .map(Value::DateTime)
                    .unwrap_or(Value::Number(serial)),
                Err(_) => Value::Text(self.value.to_owned()),
            },
            CellType::IsoDateTime => parse_iso_datetime(&self.value)
                .map(Value::DateTime)
                .unwrap_or_else(|| Value::Text(self.value.to_owned())),
            CellType::InlineString => Value::Text(self.value.to_owned()),
            CellType::SharedString => match self.value.parse::<usize>().ok().and_then(|index| shared_strings.get(index)) {
                Some(text) => Value::Text(text.to_owned()),
                None => {
                    warn!(cell = %self.reference(), index = %self.value, "shared string index out of range");
                    Value::Empty
                }
            },
        }
    }
}

/// First serial after 9999-12-31.
const MAX_DATE_SERIAL: f64 = 2_958_466.0;

/// Converts an Excel serial date number to a timestamp.
/// Serials below 60 in the 1900 system are shifted for the Lotus 1-2-3 leap year bug.
/// Serials past 9999-12-31 are not dates.
pub(crate) fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial >= MAX_DATE_SERIAL {
        return None;
    }
    let days = serial.trunc() as i64;
    let base = if is_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?
    } else if days < 60 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    let millis = (serial.fract() * 86_400_000f64).round() as i64;
    base.and_hms_opt(0, 0, 0)?
        .checked_add_signed(TimeDelta::try_days(days)?)?
        .checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    if value.contains('T') {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok()
    } else {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(kind: CellType, value: &str) -> Cell {
        Cell { row: 0, col: 0, kind, value: value.to_owned() }
    }

    #[test]
    fn custom_formats() {
        assert_eq!(CellType::parse_custom_number_format("yyyy-mm-dd", false), CellType::NumberDate1900);
        assert_eq!(CellType::parse_custom_number_format("#,##0.00", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("\"days\" 0", true), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("[Red]0.0", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("h:mm", true), CellType::NumberDate1904);
    }

    #[test]
    fn serial_dates() {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(serial_to_datetime(1.0, false), Some(date(1900, 1, 1)));
        assert_eq!(serial_to_datetime(59.0, false), Some(date(1900, 2, 28)));
        assert_eq!(serial_to_datetime(61.0, false), Some(date(1900, 3, 1)));
        assert_eq!(serial_to_datetime(45000.0, false), Some(date(2023, 3, 15)));
        assert_eq!(serial_to_datetime(0.0, true), Some(date(1904, 1, 1)));
        assert_eq!(serial_to_datetime(2_958_465.0, false), Some(date(9999, 12, 31)));
    }

    #[test]
    fn serials_out_of_range_are_not_dates() {
        assert_eq!(serial_to_datetime(1e13, false), None);
        assert_eq!(serial_to_datetime(2_958_466.0, false), None);
        assert_eq!(serial_to_datetime(f64::MAX, true), None);
        assert_eq!(serial_to_datetime(-1.0, false), None);
        assert_eq!(cell(CellType::NumberDate1900, "10000000000000").to_value(&[]), Value::from(1e13));
    }

    #[test]
    fn values() {
        let shared = vec!["Digital".to_owned()];
        assert_eq!(cell(CellType::SharedString, "0").to_value(&shared), Value::from("Digital"));
        assert_eq!(cell(CellType::SharedString, "5").to_value(&shared), Value::Empty);
        assert_eq!(cell(CellType::Number, "12.5").to_value(&shared), Value::from(12.5));
        assert_eq!(cell(CellType::Boolean, "1").to_value(&shared), Value::Bool(true));
        assert_eq!(cell(CellType::Error, "#N/A").to_value(&shared), Value::Empty);
        assert_eq!(cell(CellType::IsoDateTime, "2024-01-02").to_value(&shared).to_string(), "2024-01-02");
        assert_eq!(cell(CellType::Number, "x").reference(), "A1");
    }
}
