//! # Workbook Reading Module
//!
//! Reads `.xlsx` workbooks into [`RawSheet`] grids: the zip container, the
//! workbook part and its relationships, number formats (for date detection),
//! shared strings and worksheet cells. No header is assumed; that is the job
//! of the table module.
pub(crate) mod cell;
pub(crate) mod criteria;
pub(crate) mod excel;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod xlsx;

pub use criteria::SheetSelection;
pub use sheet::RawSheet;
pub use xlsx::XlsxWorkbook;

use thiserror::Error;

/// Errors raised while opening a workbook or reading its sheets.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// A required part is missing from the container
    #[error("Missing part '{0}' in workbook")]
    FileError(String),

    /// Encrypted or legacy `.xls` containers cannot be read
    #[error("Workbook '{0}' is encrypted or not an xlsx container")]
    CompoundFileError(String),

    /// The workbook part lists no worksheets
    #[error("Workbook '{0}' has no worksheets")]
    SpreadsheetEmptyError(String),

    /// Requested sheet is not in the workbook
    #[error("Sheet '{1}' not found in workbook '{0}'")]
    SheetNotFoundError(String, String),

    /// A sheet name pattern is not a valid glob
    #[error("Invalid sheet pattern '{0}': {1}")]
    SheetPatternError(String, String),
}
