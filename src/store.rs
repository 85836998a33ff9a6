//! The loaded-tables registry.
//!
//! A [`TableStore`] is owned by the caller and passed to whatever needs the
//! tables. Raw grids are cached per workbook path and modification time, and
//! clean tables per (sheet, header row, normalization options), so reloading an
//! unchanged workbook only re-runs header detection.
use crate::error::PivotSheetError;
use crate::source::SourceStamp;
use crate::spreadsheet::RawSheet;
use crate::spreadsheet::SheetSelection;
use crate::spreadsheet::XlsxWorkbook;
use crate::table::normalize::NormalizeOptions;
use crate::table::normalize::TableNormalizer;
use crate::table::resolve::NameResolver;
use crate::table::CleanTable;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Which sheets a load reads and how they are normalized.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub selection: SheetSelection,
    pub normalize: NormalizeOptions,
}

/// What one load made of a sheet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadSummary {
    pub sheet: String,
    pub header_row: Option<usize>,
    pub rows: usize,
    pub columns: usize,
}

/// Outcome of looking a logical name up in the store.
#[derive(Debug, PartialEq)]
pub enum TableLookup<'a> {
    Found { name: &'a str, table: &'a CleanTable },
    /// Tables are loaded but none matches
    Missing,
    /// Nothing has been loaded yet
    NotLoaded,
}

impl<'a> TableLookup<'a> {
    pub fn table(&self) -> Option<&'a CleanTable> {
        match self {
            TableLookup::Found { table, .. } => Some(*table),
            _ => None,
        }
    }
}

struct RawCache {
    stamp: SourceStamp,
    rows_limit: Option<usize>,
    sheets: Vec<RawSheet>,
}

/// Sheet, header row, total removal and junk rule address.
type CleanKey = (String, Option<usize>, bool, usize);

#[derive(Default)]
pub struct TableStore {
    resolver: NameResolver,
    raw: Option<RawCache>,
    clean: HashMap<CleanKey, CleanTable>,
    tables: Option<BTreeMap<String, CleanTable>>,
}

impl TableStore {
    pub fn new(resolver: NameResolver) -> Self {
        TableStore {
            resolver,
            ..TableStore::default()
        }
    }

    /// Reads and normalizes the selected sheets, replacing the loaded tables.
    pub fn load<P: AsRef<Path>>(&mut self, path: P, options: &LoadOptions) -> Result<Vec<LoadSummary>, PivotSheetError> {
        let stamp = SourceStamp::of(path.as_ref());
        let rows_limit = options.selection.rows_limit;
        if self.is_stale(&stamp) || self.raw.as_ref().is_some_and(|raw| raw.rows_limit != rows_limit) {
            let mut workbook = XlsxWorkbook::open(&stamp.path)?;
            let selection = SheetSelection {
                rows_limit,
                ..SheetSelection::all()
            };
            let sheets = workbook.read_sheets(&selection)?;
            debug!(path = %stamp.path.display(), sheets = sheets.len(), "read workbook grids");
            self.clean.clear();
            self.raw = Some(RawCache { stamp, rows_limit, sheets });
        } else {
            debug!(path = %stamp.path.display(), "workbook unchanged, using cached grids");
        }

        let Some(raw) = &self.raw else {
            return Ok(Vec::new());
        };
        let normalizer = TableNormalizer::new(options.normalize);
        let detector = normalizer.detector();
        let mut tables = BTreeMap::new();
        let mut summaries = Vec::new();
        for (index, sheet) in raw
            .sheets
            .iter()
            .filter(|sheet| options.selection.accept(&sheet.name))
            .enumerate()
        {
            if options.selection.sheet_limit.is_some_and(|limit| index >= limit) {
                break;
            }
            let header_row = detector.detect(sheet).map(|candidate| candidate.row_index);
            let key = (
                sheet.name.to_owned(),
                header_row,
                options.normalize.remove_totals,
                options.normalize.junk_column as usize,
            );
            let table = self
                .clean
                .entry(key)
                .or_insert_with(|| match header_row {
                    Some(header_row) => normalizer.normalize(sheet, header_row),
                    None => CleanTable::empty(&sheet.name),
                })
                .clone();
            summaries.push(LoadSummary {
                sheet: sheet.name.to_owned(),
                header_row: table.header_row,
                rows: table.row_count(),
                columns: table.col_count(),
            });
            tables.insert(sheet.name.to_owned(), table);
        }

        info!(path = %raw.stamp.path.display(), tables = tables.len(), "loaded tables");
        self.tables = Some(tables);
        Ok(summaries)
    }

    /// Loaded tables by sheet name; `None` until a load succeeds.
    pub fn tables(&self) -> Option<&BTreeMap<String, CleanTable>> {
        self.tables.as_ref()
    }

    /// Finds the table for a logical sheet name.
    pub fn lookup(&self, desired: &str) -> TableLookup<'_> {
        let Some(tables) = &self.tables else {
            return TableLookup::NotLoaded;
        };
        let names: Vec<&str> = tables.keys().map(String::as_str).collect();
        match self.resolver.resolve(&names, desired) {
            Some(name) => match tables.get_key_value(name) {
                Some((name, table)) => TableLookup::Found { name: name.as_str(), table },
                None => TableLookup::Missing,
            },
            None => {
                warn!(desired, "no loaded table matches");
                TableLookup::Missing
            }
        }
    }

    /// Loaded sheet names sorted case-insensitively.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .iter()
            .flat_map(|tables| tables.keys().cloned())
            .collect();
        names.sort_by_key(|name| name.to_lowercase());
        names
    }

    /// Raw grid of a loaded workbook sheet, by exact name.
    pub fn raw(&self, sheet_name: &str) -> Option<&RawSheet> {
        self.raw.as_ref()?.sheets.iter().find(|sheet| sheet.name == sheet_name)
    }

    /// Forgets loaded tables and every cache.
    pub fn clear(&mut self) {
        self.raw = None;
        self.clean.clear();
        self.tables = None;
    }

    /// True when `stamp` differs from the workbook the cached grids came from.
    pub fn is_stale(&self, stamp: &SourceStamp) -> bool {
        match &self.raw {
            Some(raw) => raw.stamp != *stamp || stamp.modified.is_none(),
            None => true,
        }
    }
}
