//! Scored choice of the value column to aggregate when a sheet has no fixed schema.
use crate::table::cell_at;
use crate::table::numeric::numeric_count;
use crate::table::CleanTable;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;
use tracing::warn;

static NUMERIC_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("Hardcode regex pattern"));
static DUPLICATE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"__\d+$").expect("Hardcode regex pattern"));

const KEYWORD_BONUS: i64 = 25;
const CODE_LIKE_PENALTY: i64 = 40;
const RATIO_PENALTY: i64 = 15;
const NUMERIC_DENSITY_CAP: usize = 35;
const RATIO_MARKERS: [&str; 3] = ["%", "percent", "rate"];
const TIME_PREFERENCES: [&str; 6] = ["week", "wk", "period", "date", "month", "fiscal"];

/// The report tab a table came from; supplies default column preferences.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SheetKind {
    Color,
    Wip,
    Waste,
    Generic,
}

impl SheetKind {
    pub fn default_exact_names(&self) -> &'static [&'static str] {
        match self {
            SheetKind::Color => &["Yards Produced"],
            SheetKind::Wip => &["WIP Yards", "Yards In Process"],
            SheetKind::Waste => &["Yards Wasted", "Yds Wasted"],
            SheetKind::Generic => &[],
        }
    }

    pub fn default_keyword_preferences(&self) -> &'static [&'static str] {
        match self {
            SheetKind::Color => &["yard"],
            SheetKind::Wip => &["yard", "wip"],
            SheetKind::Waste => &["waste", "yard", "yds"],
            SheetKind::Generic => &["yard", "yds", "income"],
        }
    }

    pub fn default_exclude_keywords(&self) -> &'static [&'static str] {
        match self {
            SheetKind::Color => &["color x", "ratio"],
            SheetKind::Wip | SheetKind::Waste => &["ratio"],
            SheetKind::Generic => &[],
        }
    }
}

/// A scored candidate value column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeasureColumnCandidate {
    pub column_name: String,
    pub relevance_score: i64,
    pub non_null_numeric_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeasureColumnSelector {
    pub kind: SheetKind,
    pub exact_names: Vec<String>,
    pub keyword_preferences: Vec<String>,
    pub exclude_keywords: Vec<String>,
}

impl MeasureColumnSelector {
    /// A selector using the kind's defaults for every empty list.
    pub fn new<S: AsRef<str>>(kind: SheetKind, exact_names: &[S], keyword_preferences: &[S], exclude_keywords: &[S]) -> Self {
        fn or_default<S: AsRef<str>>(given: &[S], fallback: &[&str]) -> Vec<String> {
            if given.is_empty() {
                fallback.iter().map(|name| name.to_string()).collect()
            } else {
                given.iter().map(|name| name.as_ref().to_owned()).collect()
            }
        }
        MeasureColumnSelector {
            kind,
            exact_names: or_default(exact_names, kind.default_exact_names()),
            keyword_preferences: or_default(keyword_preferences, kind.default_keyword_preferences())
                .into_iter()
                .map(|keyword| keyword.to_lowercase())
                .collect(),
            exclude_keywords: or_default(exclude_keywords, kind.default_exclude_keywords())
                .into_iter()
                .map(|keyword| keyword.to_lowercase())
                .collect(),
        }
    }

    pub fn for_kind(kind: SheetKind) -> Self {
        Self::new::<&str>(kind, &[], &[], &[])
    }

    /// Scores every column not excluded by keyword, in column order.
    pub fn rank_candidates(&self, table: &CleanTable) -> Vec<MeasureColumnCandidate> {
        table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| {
                let lowered = name.to_lowercase();
                !self.exclude_keywords.iter().any(|keyword| lowered.contains(keyword.as_str()))
            })
            .map(|(index, name)| {
                let non_null_numeric_count = numeric_count(table.rows.iter().map(|row| cell_at(row, index)));
                MeasureColumnCandidate {
                    column_name: name.to_owned(),
                    relevance_score: self.name_score(name) + non_null_numeric_count.min(NUMERIC_DENSITY_CAP) as i64,
                    non_null_numeric_count,
                }
            })
            .collect()
    }

    /// An exact name if present, else the best scoring column; `None` when
    /// no column scores above zero.
    pub fn pick(&self, table: &CleanTable) -> Option<String> {
        if let Some(name) = self.exact_names.iter().find(|name| table.column_index(name).is_some()) {
            debug!(sheet = %table.name, column = %name, "measure column by exact name");
            return Some(name.to_owned());
        }

        let best = self
            .rank_candidates(table)
            .into_iter()
            .fold(None, |best: Option<MeasureColumnCandidate>, candidate| match best {
                Some(best) if best.relevance_score >= candidate.relevance_score => Some(best),
                _ => Some(candidate),
            });
        match best {
            Some(best) if best.relevance_score > 0 => {
                debug!(sheet = %table.name, column = %best.column_name, score = best.relevance_score, "measure column by score");
                Some(best.column_name)
            }
            _ => {
                warn!(sheet = %table.name, kind = ?self.kind, "no confident measure column");
                None
            }
        }
    }

    fn name_score(&self, name: &str) -> i64 {
        let lowered = name.trim().to_lowercase();
        let mut score = 0;
        if self.keyword_preferences.iter().any(|keyword| lowered.contains(keyword.as_str())) {
            score += KEYWORD_BONUS;
        }
        if is_code_like(&lowered) {
            score -= CODE_LIKE_PENALTY;
        }
        if RATIO_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            score -= RATIO_PENALTY;
        }
        score
    }
}

/// Purely numeric names, duplicate suffixes and "unnamed" columns.
fn is_code_like(lowered: &str) -> bool {
    NUMERIC_NAME.is_match(lowered) || DUPLICATE_SUFFIX.is_match(lowered) || lowered.starts_with("unnamed")
}

pub fn pick_measure_column<S: AsRef<str>>(
    table: &CleanTable,
    kind: SheetKind,
    exact_names: &[S],
    keyword_preferences: &[S],
    exclude_keywords: &[S],
) -> Option<String> {
    MeasureColumnSelector::new(kind, exact_names, keyword_preferences, exclude_keywords).pick(table)
}

/// Columns with at least one numeric cell, most numeric first (column order on ties).
pub fn numeric_strength(table: &CleanTable, top_n: usize) -> Vec<(String, usize)> {
    let mut strengths: Vec<(String, usize)> = table
        .columns
        .iter()
        .enumerate()
        .map(|(index, name)| (name.to_owned(), numeric_count(table.rows.iter().map(|row| cell_at(row, index)))))
        .filter(|(_, count)| *count > 0)
        .collect();
    strengths.sort_by(|left, right| right.1.cmp(&left.1));
    strengths.truncate(top_n);
    strengths
}

/// First column naming a time period, by preference: week, wk, period, date, month, fiscal.
pub fn pick_time_column<S: AsRef<str>>(columns: &[S]) -> Option<&str> {
    TIME_PREFERENCES.iter().find_map(|preference| {
        columns
            .iter()
            .map(|column| column.as_ref())
            .find(|column| column.to_lowercase().contains(preference))
    })
}

/// First column whose lowercase name contains every keyword.
pub fn find_by_keywords<'a, S: AsRef<str>>(columns: &'a [S], keywords: &[&str]) -> Option<&'a str> {
    columns.iter().map(|column| column.as_ref()).find(|column| {
        let lowered = column.to_lowercase();
        keywords.iter().all(|keyword| lowered.contains(&keyword.to_lowercase()))
    })
}
