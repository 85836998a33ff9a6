//! # Pivot Sheet
//!
//! Turns pivot-table style Excel exports into clean rectangular tables, and
//! resolves the hand-edited sheet and column names of such workbooks to the
//! logical names the reports ask for.
//!
//! ## Features
//!
//! - **Workbook reading**: `.xlsx` grids read straight from the zip container,
//!   with shared strings, number formats and both date systems
//! - **Header detection**: finds the real header row below filter and title rows
//! - **Normalization**: drops junk and empty columns, empty rows and total rows,
//!   and makes column names unique
//! - **Name resolution**: exact, synonym, normalized and containment matching
//!   of sheet and column names
//! - **Measure selection**: scored choice of the value column to aggregate
//! - **Numeric coercion**: thousands separators, accounting negatives and
//!   placeholder tokens
//! - **Landing snapshots**: `Location × KPI` Parquet files with a Grand Total row,
//!   and the per-location scoreboard computed from them
//!
//! ## Pipeline
//!
//! ```text
//! XlsxWorkbook -> RawSheet -> HeaderDetector -> TableNormalizer -> CleanTable
//!                                   NameResolver / MeasureColumnSelector / NumericCoercer
//! ```
//!
//! Sources are resolved and validated by [`source`], loaded tables are held by
//! a caller-owned [`TableStore`], and every knob is read from a TOML
//! [`Config`].
mod helpers;

pub mod config;
pub mod error;
pub mod landing;
pub mod scoreboard;
pub mod source;
pub mod spreadsheet;
pub mod store;
pub mod table;

pub use config::Config;
pub use error::PivotSheetError;
pub use spreadsheet::RawSheet;
pub use spreadsheet::SheetSelection;
pub use spreadsheet::XlsxWorkbook;
pub use store::TableStore;
pub use table::header::HeaderDetector;
pub use table::measure::MeasureColumnSelector;
pub use table::normalize::TableNormalizer;
pub use table::resolve::NameResolver;
pub use table::CleanTable;
pub use table::Value;
