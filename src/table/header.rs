//! Header row detection for pivot exports that carry filter and label rows
//! above the real header.
use crate::spreadsheet::RawSheet;
use crate::table::Value;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;
use tracing::warn;

pub const DEFAULT_MIN_NON_EMPTY_CELLS: usize = 4;
pub const DEFAULT_MAX_SCAN_ROWS: usize = 25;

/// How candidate rows are ranked.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderStrategy {
    /// First row with enough non-empty cells
    #[default]
    FirstQualifying,
    /// Qualifying row with the highest non-empty plus distinct count
    BestScore,
}

/// One scanned row and its score.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeaderCandidate {
    pub row_index: usize,
    pub non_empty_count: usize,
    pub distinct_count: usize,
    /// `non_empty_count + distinct_count`
    pub score: usize,
    /// Meets the minimum non-empty cell threshold
    pub qualified: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeaderDetector {
    pub min_non_empty_cells: usize,
    pub max_scan_rows: usize,
    pub strategy: HeaderStrategy,
}

impl Default for HeaderDetector {
    fn default() -> Self {
        HeaderDetector {
            min_non_empty_cells: DEFAULT_MIN_NON_EMPTY_CELLS,
            max_scan_rows: DEFAULT_MAX_SCAN_ROWS,
            strategy: HeaderStrategy::FirstQualifying,
        }
    }
}

impl HeaderDetector {
    pub fn new(min_non_empty_cells: usize, max_scan_rows: usize, strategy: HeaderStrategy) -> Self {
        HeaderDetector { min_non_empty_cells, max_scan_rows, strategy }
    }

    /// Scores the first `max_scan_rows` rows.
    pub fn candidates(&self, rows: &[Vec<Value>]) -> Vec<HeaderCandidate> {
        rows.iter()
            .take(self.max_scan_rows)
            .enumerate()
            .map(|(row_index, row)| {
                let non_empty_count = non_empty_count(row);
                let distinct_count = distinct_count(row);
                HeaderCandidate {
                    row_index,
                    non_empty_count,
                    distinct_count,
                    score: non_empty_count + distinct_count,
                    qualified: non_empty_count >= self.min_non_empty_cells,
                }
            })
            .collect()
    }

    /// Picks the header row. `None` only for a sheet with no rows or no columns.
    ///
    /// When no scanned row qualifies the best row overall is returned, so a
    /// sheet always gets a header.
    pub fn detect(&self, sheet: &RawSheet) -> Option<HeaderCandidate> {
        if sheet.is_empty() {
            return None;
        }
        let candidates = self.candidates(&sheet.rows);
        let chosen = match self.strategy {
            HeaderStrategy::FirstQualifying => candidates
                .iter()
                .find(|candidate| candidate.qualified)
                .or_else(|| first_max_by(&candidates, |candidate| candidate.non_empty_count))
                .copied(),
            HeaderStrategy::BestScore => {
                let qualified: Vec<HeaderCandidate> = candidates.iter().filter(|candidate| candidate.qualified).copied().collect();
                let pool = if qualified.is_empty() { &candidates } else { &qualified };
                first_max_by(pool, |candidate| candidate.score).copied()
            }
        };

        match &chosen {
            Some(candidate) if candidate.qualified => {
                debug!(sheet = %sheet.name, row = candidate.row_index, score = candidate.score, "detected header row")
            }
            Some(candidate) => warn!(
                sheet = %sheet.name,
                row = candidate.row_index,
                min_non_empty_cells = self.min_non_empty_cells,
                "no row meets the header threshold, falling back to the fullest row"
            ),
            None => (),
        }
        chosen
    }
}

/// Index of the header row among `rows` using the first-qualifying rule.
/// Returns 0 for an empty grid.
pub fn detect_header_row(rows: &[Vec<Value>], min_non_empty_cells: usize, max_scan_rows: usize) -> usize {
    let detector = HeaderDetector::new(min_non_empty_cells, max_scan_rows, HeaderStrategy::FirstQualifying);
    let candidates = detector.candidates(rows);
    candidates
        .iter()
        .find(|candidate| candidate.qualified)
        .or_else(|| first_max_by(&candidates, |candidate| candidate.non_empty_count))
        .map(|candidate| candidate.row_index)
        .unwrap_or(0)
}

/// First row (within `max_scan_rows`) whose joined cells contain every token,
/// compared case-insensitively.
pub fn detect_by_tokens<S: AsRef<str>>(rows: &[Vec<Value>], tokens: &[S], max_scan_rows: usize) -> Option<usize> {
    rows.iter().take(max_scan_rows).position(|row| {
        let joined = row.iter().map(Value::as_text).collect::<Vec<_>>().join(" | ").to_uppercase();
        tokens.iter().all(|token| joined.contains(&token.as_ref().to_uppercase()))
    })
}

/// Cells whose trimmed text is neither empty nor a placeholder token.
pub fn non_empty_count(row: &[Value]) -> usize {
    row.iter().filter(|value| !value.is_blank()).count()
}

/// Distinct trimmed texts among the non-empty cells.
pub fn distinct_count(row: &[Value]) -> usize {
    row.iter()
        .filter(|value| !value.is_blank())
        .map(Value::as_text)
        .collect::<HashSet<_>>()
        .len()
}

fn first_max_by<F>(candidates: &[HeaderCandidate], key: F) -> Option<&HeaderCandidate>
where
    F: Fn(&HeaderCandidate) -> usize,
{
    candidates
        .iter()
        .fold(None, |best: Option<&HeaderCandidate>, candidate| match best {
            Some(best) if key(best) >= key(candidate) => Some(best),
            _ => Some(candidate),
        })
}
