use crate::error::PivotSheetError;
use crate::spreadsheet::SpreadsheetError;
use glob::Pattern;

/// Which sheets to read from a workbook, and how much of each.
#[derive(Clone, Debug, Default)]
pub struct SheetSelection {
    /// Sheet name patterns; `None` selects every sheet.
    pub sheet_name_patterns: Option<Vec<Pattern>>,

    /// Maximum number of sheets to read.
    pub sheet_limit: Option<usize>,

    /// Maximum number of rows to read per sheet.
    pub rows_limit: Option<usize>,
}

impl SheetSelection {
    /// Selects every sheet in full.
    pub fn all() -> Self {
        Self::default()
    }

    /// Selects sheets matching any of the glob patterns.
    pub fn matching<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PivotSheetError> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern.as_ref())
                    .map_err(|error| SpreadsheetError::SheetPatternError(pattern.as_ref().to_owned(), error.msg.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            sheet_name_patterns: Some(patterns),
            ..Self::default()
        })
    }

    pub fn with_rows_limit(mut self, rows_limit: usize) -> Self {
        self.rows_limit = Some(rows_limit);
        self
    }

    /// Checks if a sheet name matches the patterns.
    /// Returns true if no patterns are specified or if name matches any pattern.
    pub fn accept(&self, sheet_name: &str) -> bool {
        match &self.sheet_name_patterns {
            Some(patterns) => patterns.iter().any(|pattern| pattern.matches(sheet_name)),
            None => true,
        }
    }
}
