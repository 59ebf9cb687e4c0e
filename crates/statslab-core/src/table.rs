// Canonical table shape shared by every catalog entry: ordered column names
// plus rows mapping column name to a scalar cell.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// A single normalized value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Renders the value as it appears in CSV exports. `Null` renders empty and
/// numbers use the shortest round-trippable form (`20`, `1.35`).
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

pub type Row = BTreeMap<String, Cell>;

/// Normalized table: `columns` is the display order, each row maps a subset
/// of those columns to values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl StatTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every row key is one of `columns`, and column names are unique.
    pub fn is_consistent(&self) -> bool {
        let cols: HashSet<&str> = self.columns.iter().map(String::as_str).collect();
        cols.len() == self.columns.len()
            && self
                .rows
                .iter()
                .all(|row| row.keys().all(|k| cols.contains(k.as_str())))
    }

    /// Values of one column in row order; rows lacking the column yield `Null`.
    pub fn column_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Cell> + 'a {
        const NULL: &Cell = &Cell::Null;
        self.rows.iter().map(move |row| row.get(name).unwrap_or(NULL))
    }

    /// Sorted distinct values of the `team` column.
    pub fn team_names(&self) -> Vec<String> {
        let names: BTreeSet<String> = self
            .column_values("team")
            .filter_map(|c| c.as_text().map(str::to_string))
            .collect();
        names.into_iter().collect()
    }

    /// Keep rows belonging to any of `teams`. Tables with a `team` column
    /// match on it; schedules match either `home_team` or `away_team`.
    /// Tables with neither are returned unchanged.
    pub fn filter_teams(&self, teams: &[String]) -> StatTable {
        if teams.is_empty() {
            return self.clone();
        }
        let wanted: HashSet<&str> = teams.iter().map(String::as_str).collect();
        let has = |name: &str| self.columns.iter().any(|c| c == name);

        let fields: Vec<&str> = if has("team") {
            vec!["team"]
        } else if has("home_team") && has("away_team") {
            vec!["home_team", "away_team"]
        } else {
            return self.clone();
        };

        let rows = self
            .rows
            .iter()
            .filter(|row| {
                fields.iter().any(|f| {
                    row.get(*f)
                        .and_then(Cell::as_text)
                        .is_some_and(|t| wanted.contains(t))
                })
            })
            .cloned()
            .collect();

        StatTable {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Stack tables vertically. Columns are the union in first-seen order.
    pub fn concat<'a, I>(tables: I) -> StatTable
    where
        I: IntoIterator<Item = &'a StatTable>,
    {
        let mut out = StatTable::default();
        let mut seen: HashSet<String> = HashSet::new();
        for table in tables {
            for col in &table.columns {
                if seen.insert(col.clone()) {
                    out.columns.push(col.clone());
                }
            }
            out.rows.extend(table.rows.iter().cloned());
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
