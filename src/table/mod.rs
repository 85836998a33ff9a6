//! # Table Normalization Module
//!
//! Turns pivot-export grids into clean rectangular tables:
//!
//! - [`header`] finds the header row of a [`RawSheet`](crate::RawSheet);
//! - [`normalize`] promotes it, drops junk rows and columns and removes total rows;
//! - [`resolve`] maps logical sheet and column names onto the messy names present;
//! - [`measure`] picks the value column to aggregate;
//! - [`numeric`] parses locale-formatted numeric text.
pub mod header;
pub mod measure;
pub mod normalize;
pub mod numeric;
pub mod resolve;
mod value;

pub use value::is_placeholder;
pub use value::Value;
pub use value::PLACEHOLDER_TOKENS;

static EMPTY: Value = Value::Empty;

/// Cell `index` of a row, empty past the row's end.
pub fn cell_at(row: &[Value], index: usize) -> &Value {
    row.get(index).unwrap_or(&EMPTY)
}

/// A rectangular table with unique, non-empty column names.
///
/// Rows keep their source order and every row has one cell per column.
/// Cells missing from a hand-built short row read as empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CleanTable {
    /// Sheet the table was built from
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Index of the promoted header row in the raw grid; data rows lie strictly below it
    pub header_row: Option<usize>,
}

impl CleanTable {
    /// The empty table (no rows, no columns).
    pub fn empty(name: &str) -> Self {
        CleanTable {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value> + '_> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| cell_at(row, index)))
    }

    /// Renames a column; false when `from` is absent or `to` is already taken.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        if from != to && self.column_index(to).is_some() {
            return false;
        }
        match self.column_index(from) {
            Some(index) => {
                self.columns[index] = to.to_owned();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CleanTable {
        CleanTable {
            name: "WIP".to_owned(),
            columns: vec!["Location".to_owned(), "Yards".to_owned()],
            rows: vec![
                vec![Value::from("Digital"), Value::from(100.0)],
                vec![Value::from("Screen Print"), Value::from(200.0)],
            ],
            header_row: Some(2),
        }
    }

    #[test]
    fn column_access() {
        let table = table();
        assert_eq!(table.column_index("Yards"), Some(1));
        let yards: Vec<String> = table.column("Yards").unwrap().map(Value::as_text).collect();
        assert_eq!(yards, vec!["100", "200"]);
        assert!(table.column("Color").is_none());
    }

    #[test]
    fn rename_keeps_names_unique() {
        let mut table = table();
        assert!(!table.rename_column("Yards", "Location"));
        assert!(table.rename_column("Yards", "Yards Produced"));
        assert_eq!(table.columns, vec!["Location", "Yards Produced"]);
        assert!(!table.rename_column("Missing", "Other"));
    }

    #[test]
    fn short_rows_read_as_empty() {
        let mut table = table();
        table.rows.push(vec![Value::from("Design")]);
        table.rows.push(vec![]);
        let yards: Vec<&Value> = table.column("Yards").unwrap().collect();
        assert_eq!(yards, vec![&Value::from(100.0), &Value::from(200.0), &Value::Empty, &Value::Empty]);
        assert_eq!(cell_at(&[], 3), &Value::Empty);
    }

    #[test]
    fn empty_table() {
        let table = CleanTable::empty("Sheet");
        assert!(table.is_empty());
        assert_eq!((table.row_count(), table.col_count()), (0, 0));
    }
}
