//! Locating and validating the workbook, and checking its sheet contract.
use crate::config::SourceConfig;
use crate::error::PivotSheetError;
use crate::error::ResultMessage;
use crate::error::ResultOptionChain;
use crate::spreadsheet::excel::WORKBOOK_PART;
use crate::spreadsheet::XlsxWorkbook;
use chrono::DateTime;
use chrono::Local;
use std::io::Cursor;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use thiserror::Error;
use tracing::info;
use tracing::warn;
use zip::ZipArchive;

/// The seven tabs every published workbook must carry.
pub const REQUIRED_SHEETS: [&str; 7] = [
    "Written and Produced by Week",
    "Written Produced Invoiced",
    "YTD Plan vs Act",
    "YTD vs LY",
    "Color Yards",
    "WIP",
    "Yards Wasted",
];

/// Placeholder tabs that mark an unfinished export.
pub const FORBIDDEN_SHEETS: [&str; 1] = ["Sheet1"];

const ZIP_SIGNATURE: &[u8] = b"PK";
const CFB_SIGNATURE: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];
const SNIFF_LENGTH: usize = 200;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("No workbook available: neither '{0}' nor '{1}' exists")]
    Unavailable(String, String),

    #[error("Payload is an HTML page, not a workbook; check the export permissions")]
    HtmlPayload,

    #[error("Payload too small for a workbook ({0} bytes, expected at least {1})")]
    TooSmall(usize, usize),

    #[error("Payload is an encrypted or legacy .xls container")]
    CompoundFile,

    #[error("Payload is not a zip container")]
    NotZip,

    #[error("Zip container has no '{0}' part")]
    MissingManifest(String),
}

#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Workbook does not match the sheet contract (missing: {missing:?}, forbidden: {forbidden:?})")]
    Mismatch {
        missing: Vec<String>,
        forbidden: Vec<String>,
    },
}

/// Which configured location a workbook came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Published,
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkbookSource {
    pub path: PathBuf,
    pub kind: SourceKind,
}

impl WorkbookSource {
    /// The published workbook if present, else the fallback.
    pub fn resolve(config: &SourceConfig) -> Result<WorkbookSource, PivotSheetError> {
        let published = existing(&config.published_path).map(|path| {
            path.map(|path| WorkbookSource { path, kind: SourceKind::Published })
        });
        let source = published.ok_none_else(|| {
            warn!(path = %config.published_path.display(), "published workbook missing, trying fallback");
            existing(&config.fallback_path).map(|path| {
                path.map(|path| WorkbookSource { path, kind: SourceKind::Fallback })
            })
        })?;
        let source = source.ok_or_else(|| {
            SourceError::Unavailable(
                config.published_path.display().to_string(),
                config.fallback_path.display().to_string(),
            )
        })?;
        info!(path = %source.path.display(), kind = ?source.kind, "using workbook");
        Ok(source)
    }

    pub fn stamp(&self) -> SourceStamp {
        SourceStamp::of(&self.path)
    }

    pub fn open(&self) -> Result<XlsxWorkbook, PivotSheetError> {
        XlsxWorkbook::open(&self.path)
    }
}

fn existing(path: &Path) -> Result<Option<PathBuf>, PivotSheetError> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Ok(Some(path.to_path_buf())),
        Ok(_) => Ok(None),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Checks that a payload is a readable `.xlsx` container.
pub fn validate_bytes(bytes: &[u8], min_bytes: usize) -> Result<(), PivotSheetError> {
    if bytes.len() < min_bytes {
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(SNIFF_LENGTH)]).to_lowercase();
        if head.contains("<html") {
            Err(SourceError::HtmlPayload)?;
        }
        Err(SourceError::TooSmall(bytes.len(), min_bytes))?;
    }
    if bytes.starts_with(&CFB_SIGNATURE) {
        Err(SourceError::CompoundFile)?;
    }
    if !bytes.starts_with(ZIP_SIGNATURE) {
        Err(SourceError::NotZip)?;
    }
    let archive = ZipArchive::new(Cursor::new(bytes)).map_err(|_| SourceError::NotZip)?;
    if !archive.file_names().any(|name| name.eq_ignore_ascii_case(WORKBOOK_PART)) {
        Err(SourceError::MissingManifest(WORKBOOK_PART.to_owned()))?;
    }
    Ok(())
}

/// Result of installing a workbook payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InstallOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Validates a payload and replaces `target` with it (temp file, then rename).
pub fn install_bytes(bytes: &[u8], target: &Path, min_bytes: usize) -> Result<InstallOutcome, PivotSheetError> {
    validate_bytes(bytes, min_bytes)?;
    let exists = target.is_file();
    if exists && std::fs::read(target)? == bytes {
        return Ok(InstallOutcome::Unchanged);
    }
    if let Some(parent) = target.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let temporary = target.with_extension("xlsx.tmp");
    std::fs::write(&temporary, bytes)
        .map_err(PivotSheetError::from)
        .with_prefix("Write workbook failed")?;
    std::fs::rename(&temporary, target)
        .map_err(PivotSheetError::from)
        .with_prefix("Replace workbook failed")?;
    info!(path = %target.display(), bytes = bytes.len(), "installed workbook");
    Ok(if exists { InstallOutcome::Updated } else { InstallOutcome::Created })
}

/// A workbook path and its modification time, the cache key for reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStamp {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

impl SourceStamp {
    pub fn of(path: &Path) -> SourceStamp {
        let modified = std::fs::metadata(path).and_then(|metadata| metadata.modified()).ok();
        SourceStamp { path: path.to_path_buf(), modified }
    }

    /// Local modification time as `%Y-%m-%d %H:%M:%S`.
    pub fn last_updated(&self) -> Option<String> {
        self.modified
            .map(|modified| DateTime::<Local>::from(modified).format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

/// Present and missing required sheets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractReport {
    pub present: Vec<String>,
    pub missing: Vec<String>,
}

/// Required and forbidden tab names of a published workbook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetContract {
    required: Vec<String>,
    forbidden: Vec<String>,
}

impl Default for SheetContract {
    fn default() -> Self {
        SheetContract::new(&REQUIRED_SHEETS, &FORBIDDEN_SHEETS)
    }
}

impl SheetContract {
    pub fn new<S: AsRef<str>>(required: &[S], forbidden: &[S]) -> Self {
        SheetContract {
            required: required.iter().map(|name| name.as_ref().to_owned()).collect(),
            forbidden: forbidden.iter().map(|name| name.as_ref().to_owned()).collect(),
        }
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Compares the workbook's sheet names to the contract.
    pub fn report<S: AsRef<str>>(&self, sheet_names: &[S]) -> (ContractReport, Vec<String>) {
        let has = |name: &str| sheet_names.iter().any(|sheet| sheet.as_ref() == name);
        let (present, missing): (Vec<String>, Vec<String>) = self.required.iter().cloned().partition(|name| has(name.as_str()));
        let forbidden = self.forbidden.iter().filter(|name| has(name.as_str())).cloned().collect();
        (ContractReport { present, missing }, forbidden)
    }

    /// Ok when every required sheet is present and no forbidden sheet is.
    pub fn check<S: AsRef<str>>(&self, sheet_names: &[S]) -> Result<ContractReport, PivotSheetError> {
        let (report, forbidden) = self.report(sheet_names);
        if report.missing.is_empty() && forbidden.is_empty() {
            Ok(report)
        } else {
            warn!(missing = ?report.missing, forbidden = ?forbidden, "sheet contract violated");
            Err(ContractError::Mismatch { missing: report.missing, forbidden }.into())
        }
    }

    /// Sheets of the workbook that the contract allows, in workbook order.
    pub fn exposed<S: AsRef<str>>(&self, sheet_names: &[S]) -> Vec<String> {
        sheet_names
            .iter()
            .map(|name| name.as_ref())
            .filter(|name| self.required.iter().any(|required| required == name))
            .map(str::to_owned)
            .collect()
    }
}
