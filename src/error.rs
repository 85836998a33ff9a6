use thiserror::Error;

/// Every failure the crate reports.
///
/// Module errors convert with `?`, and [`ResultMessage::with_prefix`] adds the
/// step that failed as a `WithContextError`.
#[derive(Error, Debug)]
pub enum PivotSheetError {
    #[error("{0}")]
    WithContextError(String),

    #[error("{0}")]
    IoError(#[from] std::io::Error),

    /// Configuration files, read through `anyhow::Context`
    #[error("{0}")]
    AnyhowError(#[from] anyhow::Error),

    #[error("{0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    SourceError(#[from] crate::source::SourceError),

    #[error("{0}")]
    ContractError(#[from] crate::source::ContractError),

    #[error("{0}")]
    SnapshotError(#[from] crate::landing::SnapshotError),

    /// Parquet snapshots are written and read through DuckDB
    #[error("{0}")]
    DuckDBError(#[from] duckdb::Error),
}

pub(crate) trait ResultOptionChain {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self;
}

impl<T, E> ResultOptionChain for Result<Option<T>, E> {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self {
            Ok(None) => f(),
            _ => self,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, PivotSheetError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| PivotSheetError::WithContextError(format!("{}: {}", message, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_prefix_wraps_message() {
        let result: Result<(), PivotSheetError> = Err(std::io::Error::other("disk gone").into());
        let error = result.with_prefix("Read workbook failed").unwrap_err();
        assert_eq!(error.to_string(), "Read workbook failed: disk gone");
    }

    #[test]
    fn ok_none_else_falls_through() {
        let first: Result<Option<u8>, PivotSheetError> = Ok(None);
        assert_eq!(first.ok_none_else(|| Ok(Some(3))).unwrap(), Some(3));
        let second: Result<Option<u8>, PivotSheetError> = Ok(Some(1));
        assert_eq!(second.ok_none_else(|| Ok(Some(3))).unwrap(), Some(1));
    }
}
