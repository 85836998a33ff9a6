//! TOML configuration. Every section and key is optional; an empty document
//! yields [`Config::default`].
//!
//! ```toml
//! [source]
//! published_path = "data/current.xlsx"
//! fallback_path = "data/WIP Test Data.xlsx"
//! min_bytes = 2000
//!
//! [detection]
//! min_non_empty_cells = 4
//! max_scan_rows = 25
//! strategy = "first_qualifying"
//!
//! [normalize]
//! remove_totals = true
//!
//! [synonyms]
//! "wip" = ["work in proc"]
//!
//! [snapshots]
//! plan_path = "landing_ytd_plan.parquet"
//! ly_path = "landing_ytd_vs_ly.parquet"
//! ```
use crate::error::PivotSheetError;
use crate::source::SheetContract;
use crate::source::FORBIDDEN_SHEETS;
use crate::source::REQUIRED_SHEETS;
use crate::store::LoadOptions;
use crate::table::header::HeaderStrategy;
use crate::table::header::DEFAULT_MAX_SCAN_ROWS;
use crate::table::header::DEFAULT_MIN_NON_EMPTY_CELLS;
use crate::table::normalize::NormalizeOptions;
use crate::table::resolve::NameResolver;
use crate::table::resolve::SynonymTable;
use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_MIN_BYTES: usize = 2000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration value for '{0}': {1}")]
    InvalidValue(String, String),
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub contract: ContractConfig,
    pub detection: DetectionConfig,
    pub normalize: NormalizeConfig,
    /// Extra `canonical -> variants` entries merged over the built-in synonyms
    pub synonyms: BTreeMap<String, Vec<String>>,
    pub snapshots: SnapshotConfig,
}

/// Where the workbook is read from.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub published_path: PathBuf,
    pub fallback_path: PathBuf,
    /// Smaller payloads are rejected as truncated or error pages
    pub min_bytes: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            published_path: PathBuf::from("data/current.xlsx"),
            fallback_path: PathBuf::from("data/WIP Test Data.xlsx"),
            min_bytes: DEFAULT_MIN_BYTES,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    pub required_sheets: Vec<String>,
    pub forbidden_sheets: Vec<String>,
}

impl Default for ContractConfig {
    fn default() -> Self {
        ContractConfig {
            required_sheets: REQUIRED_SHEETS.iter().map(|name| name.to_string()).collect(),
            forbidden_sheets: FORBIDDEN_SHEETS.iter().map(|name| name.to_string()).collect(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub min_non_empty_cells: usize,
    pub max_scan_rows: usize,
    pub strategy: HeaderStrategy,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            min_non_empty_cells: DEFAULT_MIN_NON_EMPTY_CELLS,
            max_scan_rows: DEFAULT_MAX_SCAN_ROWS,
            strategy: HeaderStrategy::FirstQualifying,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub remove_totals: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        NormalizeConfig { remove_totals: true }
    }
}

/// Output paths of the landing snapshots.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub plan_path: PathBuf,
    pub ly_path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        SnapshotConfig {
            plan_path: PathBuf::from("landing_ytd_plan.parquet"),
            ly_path: PathBuf::from("landing_ytd_vs_ly.parquet"),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Config, PivotSheetError> {
        let config: Config = toml::from_str(content).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, PivotSheetError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Read config '{}' failed", path.display()))?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.detection.max_scan_rows == 0 {
            return Err(ConfigError::InvalidValue("detection.max_scan_rows".to_owned(), "must be at least 1".to_owned()));
        }
        if self.detection.min_non_empty_cells == 0 {
            return Err(ConfigError::InvalidValue("detection.min_non_empty_cells".to_owned(), "must be at least 1".to_owned()));
        }
        Ok(())
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            min_text_cells: self.detection.min_non_empty_cells,
            max_scan_rows: self.detection.max_scan_rows,
            strategy: self.detection.strategy,
            remove_totals: self.normalize.remove_totals,
            ..NormalizeOptions::default()
        }
    }

    /// Built-in synonyms with the configured entries merged in.
    pub fn resolver(&self) -> NameResolver {
        let mut synonyms = SynonymTable::builtin();
        synonyms.merge(&self.synonyms);
        NameResolver::new(synonyms)
    }

    pub fn contract(&self) -> SheetContract {
        SheetContract::new(&self.contract.required_sheets, &self.contract.forbidden_sheets)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            normalize: self.normalize_options(),
            ..LoadOptions::default()
        }
    }
}
