use crate::spreadsheet::cell::Cell;
use crate::table::Value;

/// An ordered grid of cell values read from one worksheet, with no assumed header.
///
/// Row `i` of the grid is row `i + 1` of the worksheet. Columns start at the
/// leftmost used column, and every row is padded to the used width.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawSheet {
    /// Sheet name
    pub name: String,
    /// Cell values, row-major
    pub rows: Vec<Vec<Value>>,
}

impl RawSheet {
    /// Builds a sheet from literal rows, padding short rows with empty cells.
    pub fn new<R, V>(name: &str, rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut rows: Vec<Vec<Value>> = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in rows.iter_mut() {
            row.resize(width, Value::Empty);
        }
        RawSheet { name: name.to_owned(), rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn col_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Returns true if the sheet has no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0 || self.col_count() == 0
    }

    /// The first `rows` rows, for previews of what header detection saw.
    pub fn head(&self, rows: usize) -> &[Vec<Value>] {
        &self.rows[..rows.min(self.rows.len())]
    }
}

/// Collects worksheet cells in document order and tracks the used range.
pub(crate) struct SheetBuilder {
    /// Sheet name
    name: String,
    /// All cells in the sheet
    cells: Vec<Cell>,
    /// Row limit for data extraction
    limit: Option<usize>,
    /// Actual data range (determined from cell data)
    row_upper_bound: Option<usize>,
    col_lower_bound: Option<usize>,
    col_upper_bound: Option<usize>,
}

impl SheetBuilder {
    pub(crate) fn new(name: &str, limit: Option<usize>) -> Self {
        Self {
            name: name.to_owned(),
            cells: Vec::new(),
            limit,
            row_upper_bound: None,
            col_lower_bound: None,
            col_upper_bound: None,
        }
    }

    /// Checks if a row is beyond the row limit.
    pub(crate) fn after_row_limit(&self, row: usize) -> bool {
        self.limit.map(|limit| limit <= row).unwrap_or(false)
    }

    /// Adds a cell to the sheet, updating the used range.
    pub(crate) fn push(&mut self, cell: Cell) {
        self.update_bound(cell.row, cell.col);
        self.cells.push(cell);
    }

    fn update_bound(&mut self, row: usize, col: usize) {
        if self.row_upper_bound.map(|row_upper_bound| row_upper_bound < row).unwrap_or(true) {
            self.row_upper_bound = Some(row);
        }
        if self.col_lower_bound.map(|col_lower_bound| col < col_lower_bound).unwrap_or(true) {
            self.col_lower_bound = Some(col);
        }
        if self.col_upper_bound.map(|col_upper_bound| col_upper_bound < col).unwrap_or(true) {
            self.col_upper_bound = Some(col);
        }
    }

    /// Lays the collected cells out as a padded grid.
    pub(crate) fn finish(self, shared_strings: &[String]) -> RawSheet {
        let (Some(row_upper), Some(col_lower), Some(col_upper)) =
            (self.row_upper_bound, self.col_lower_bound, self.col_upper_bound)
        else {
            return RawSheet { name: self.name, rows: Vec::new() };
        };
        let width = col_upper - col_lower + 1;
        let mut rows = vec![vec![Value::Empty; width]; row_upper + 1];
        for cell in &self.cells {
            if let Some(slot) = rows.get_mut(cell.row).and_then(|row| row.get_mut(cell.col - col_lower)) {
                *slot = cell.to_value(shared_strings);
            }
        }
        RawSheet { name: self.name, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::CellType;

    fn push(sheet: &mut SheetBuilder, row: usize, col: usize, value: &str) {
        sheet.push(Cell {
            row,
            col,
            kind: CellType::InlineString,
            value: value.to_owned(),
        });
    }

    #[test]
    fn sheet_initial() {
        let sheet = SheetBuilder::new("Empty", None).finish(&[]);
        assert!(sheet.is_empty());
        assert_eq!(sheet.name, "Empty");
    }

    #[test]
    fn sheet_layout() {
        let mut sheet = SheetBuilder::new("WIP", None);
        push(&mut sheet, 1, 1, "a");
        push(&mut sheet, 1, 3, "b");
        push(&mut sheet, 3, 2, "c");
        let sheet = sheet.finish(&[]);

        assert_eq!(sheet.row_count(), 4);
        assert_eq!(sheet.col_count(), 3);
        assert!(sheet.rows[0].iter().all(Value::is_empty));
        assert_eq!(sheet.rows[1], vec![Value::from("a"), Value::Empty, Value::from("b")]);
        assert_eq!(sheet.rows[3][1], Value::from("c"));
    }

    #[test]
    fn sheet_limit() {
        let sheet = SheetBuilder::new("Limited", Some(2));
        assert!(!sheet.after_row_limit(1));
        assert!(sheet.after_row_limit(2));
    }

    #[test]
    fn literal_rows_are_padded() {
        let sheet = RawSheet::new("Color Yards", vec![
            vec![Value::from("Weeks"), Value::from("Yards")],
            vec![Value::from(1.0)],
        ]);
        assert_eq!(sheet.col_count(), 2);
        assert_eq!(sheet.rows[1][1], Value::Empty);
        assert_eq!(sheet.head(10).len(), 2);
    }

    #[test]
    fn ragged_rows_use_the_widest_row() {
        let sheet = RawSheet {
            name: "WIP".to_owned(),
            rows: vec![vec![], vec![Value::from("Location"), Value::from("Yards")]],
        };
        assert_eq!(sheet.col_count(), 2);
        assert!(!sheet.is_empty());
    }
}
