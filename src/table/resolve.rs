//! Fuzzy resolution of logical sheet and column names.
//!
//! Workbook tabs get renamed and mistyped by hand, so a logical name such as
//! "written produced invoiced" is matched against the names actually present
//! in four stages, stopping at the first hit:
//!
//! 1. exact string match;
//! 2. trimmed, case-insensitive match against the synonym variants;
//! 3. equality of the normalized (lowercase, alphanumeric only) names;
//! 4. containment of a normalized candidate in a normalized name.
use std::collections::BTreeMap;
use tracing::debug;

/// Canonical name and its known variants, built in.
const BUILTIN_SYNONYMS: &[(&str, &[&str])] = &[
    ("written produced by week", &[
        "written produced by week",
        "written and produced by week",
        "written produced week",
        "written produced weekly",
        "written produced by wk",
        "written produced",
        "written v produced by week",
    ]),
    ("written produced invoiced", &[
        "written produced invoiced",
        "witten produced invoiced",
        "written produced & invoiced",
        "written produced and invoiced",
        "written produced invoice",
        "written produced invoicing",
    ]),
    ("ytd plan v actual", &[
        "ytd plan v actual",
        "ytd plan vs act",
        "ytd plan vs actual",
        "ytd plan v. actual",
        "plan v actual ytd",
        "plan vs actual ytd",
        "ytd plan actual",
    ]),
    ("ytd v ly", &[
        "ytd v ly",
        "ytd vs ly",
        "ytd v. ly",
        "ytd vs last year",
        "ytd v last year",
        "ytd vs last yr",
    ]),
    ("color yds", &[
        "color yds",
        "color yards",
        "color yds.",
        "color yards report",
        "color yards by",
        "color",
    ]),
    ("wip", &[
        "wip",
        "work in process",
        "work in progress",
    ]),
    ("yds wasted", &[
        "yds wasted",
        "yards wasted",
        "waste yds",
        "wasted yards",
        "yds waste",
        "yards waste",
    ]),
];

/// A canonical logical name and the literal names it may appear under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynonymEntry {
    pub canonical: String,
    /// Ordered; earlier variants are tried first
    pub variants: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SynonymTable {
    entries: Vec<SynonymEntry>,
}

impl SynonymTable {
    /// The table covering the seven report tabs.
    pub fn builtin() -> Self {
        let entries = BUILTIN_SYNONYMS
            .iter()
            .map(|(canonical, variants)| SynonymEntry {
                canonical: canonical.to_string(),
                variants: variants.iter().map(|variant| variant.to_string()).collect(),
            })
            .collect();
        SynonymTable { entries }
    }

    /// Adds variants to an entry (matched by normalized canonical name), or a new entry.
    pub fn extend<S: AsRef<str>>(&mut self, canonical: &str, variants: &[S]) {
        let key = normalize_name(canonical);
        let index = match self.entries.iter().position(|entry| normalize_name(&entry.canonical) == key) {
            Some(index) => index,
            None => {
                self.entries.push(SynonymEntry {
                    canonical: canonical.trim().to_lowercase(),
                    variants: vec![canonical.trim().to_lowercase()],
                });
                self.entries.len() - 1
            }
        };
        let entry = &mut self.entries[index];
        for variant in variants {
            let variant = variant.as_ref().trim().to_lowercase();
            if !entry.variants.contains(&variant) {
                entry.variants.push(variant);
            }
        }
    }

    /// Merges `canonical -> variants` pairs, such as the ones from configuration.
    pub fn merge(&mut self, extra: &BTreeMap<String, Vec<String>>) {
        for (canonical, variants) in extra {
            self.extend(canonical, variants);
        }
    }

    /// The entry for a desired name, found by its canonical name or any variant.
    pub fn entry(&self, desired: &str) -> Option<&SynonymEntry> {
        let key = normalize_name(desired);
        if key.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| normalize_name(&entry.canonical) == key)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|entry| entry.variants.iter().any(|variant| normalize_name(variant) == key))
            })
    }

    pub fn entries(&self) -> &[SynonymEntry] {
        &self.entries
    }
}

/// Which stage produced a match.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Synonym,
    Normalized,
    Contains,
}

/// Pure lookup of logical names against the names present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameResolver {
    synonyms: SynonymTable,
}

impl Default for NameResolver {
    fn default() -> Self {
        NameResolver::new(SynonymTable::builtin())
    }
}

impl NameResolver {
    pub fn new(synonyms: SynonymTable) -> Self {
        NameResolver { synonyms }
    }

    pub fn synonyms(&self) -> &SynonymTable {
        &self.synonyms
    }

    /// The available name matching `desired`, or `None` when nothing matches.
    pub fn resolve<'a, S: AsRef<str>>(&self, available: &'a [S], desired: &str) -> Option<&'a str> {
        self.resolve_with_kind(available, desired).map(|(name, _)| name)
    }

    /// Like [`resolve`](Self::resolve), also reporting the stage that matched.
    pub fn resolve_with_kind<'a, S: AsRef<str>>(&self, available: &'a [S], desired: &str) -> Option<(&'a str, MatchKind)> {
        let names: Vec<&'a str> = available.iter().map(|name| name.as_ref()).collect();

        if let Some(name) = names.iter().find(|name| **name == desired) {
            return Some((*name, MatchKind::Exact));
        }

        let variants: Vec<&str> = self
            .synonyms
            .entry(desired)
            .map(|entry| entry.variants.iter().map(String::as_str).collect())
            .unwrap_or_default();
        for variant in &variants {
            let variant = variant.trim().to_lowercase();
            if let Some(name) = names.iter().find(|name| name.trim().to_lowercase() == variant) {
                debug!(desired, matched = *name, "resolved by synonym");
                return Some((*name, MatchKind::Synonym));
            }
        }

        let normalized_names: Vec<String> = names.iter().map(|name| normalize_name(name)).collect();
        let candidates: Vec<String> = std::iter::once(desired)
            .chain(variants.iter().copied())
            .map(normalize_name)
            .filter(|candidate| !candidate.is_empty())
            .collect();

        for candidate in &candidates {
            if let Some(index) = normalized_names.iter().position(|name| name == candidate) {
                debug!(desired, matched = names[index], "resolved by normalized name");
                return Some((names[index], MatchKind::Normalized));
            }
        }
        for candidate in &candidates {
            if let Some(index) = normalized_names.iter().position(|name| name.contains(candidate.as_str())) {
                debug!(desired, matched = names[index], "resolved by containment");
                return Some((names[index], MatchKind::Contains));
            }
        }

        debug!(desired, "no name matched");
        None
    }
}

/// Lowercase and keep only alphanumeric characters.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|character| character.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// `(name, normalized)` pairs sorted case-insensitively, for diagnosing matches.
pub fn debug_map<S: AsRef<str>>(names: &[S]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = names
        .iter()
        .map(|name| (name.as_ref().to_owned(), normalize_name(name.as_ref())))
        .collect();
    pairs.sort_by_key(|(name, _)| name.to_lowercase());
    pairs
}

/// Strict column lookup: first candidate whose key (lowercase, spaces and
/// hyphens as underscores) equals a column's key.
pub fn find_column<'a, S: AsRef<str>, C: AsRef<str>>(columns: &'a [S], candidates: &[C]) -> Option<&'a str> {
    let keys: Vec<String> = columns.iter().map(|column| column_key(column.as_ref())).collect();
    candidates.iter().find_map(|candidate| {
        let candidate = column_key(candidate.as_ref());
        keys.iter()
            .position(|key| *key == candidate)
            .map(|index| columns[index].as_ref())
    })
}

fn column_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|character| if character == ' ' || character == '-' { '_' } else { character })
        .collect()
}
