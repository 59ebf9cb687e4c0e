// Raw provider tables -> canonical StatTable.
//
// Header levels are flattened with `_`, renamed through the provider's
// column map, de-duplicated with numeric suffixes, and every cell is coerced
// to null, number or string. Row order is never changed.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::source::{ColumnKind, RawTable};
use crate::table::{Cell, Row, StatTable};

/// Separator used when joining multi-level headers.
pub const LEVEL_SEPARATOR: &str = "_";

/// Name given to a column whose header levels are all blank.
pub const UNNAMED_COLUMN: &str = "unnamed";

// ---------------------------------------------------------------------------
// Column map
// ---------------------------------------------------------------------------

/// Provider-specific column mapping table.
///
/// Keys are matched against a column's provider id when it has one, and its
/// flattened header name otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    renames: BTreeMap<String, String>,
    drops: BTreeSet<String>,
}

impl ColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename(mut self, from: &str, to: &str) -> Self {
        self.renames.insert(from.to_string(), to.to_string());
        self
    }

    pub fn drop_column(mut self, name: &str) -> Self {
        self.drops.insert(name.to_string());
        self
    }

    fn lookup<'a>(&'a self, source_id: Option<&'a str>, flat: &'a str) -> Option<&'a str> {
        source_id
            .and_then(|id| self.renames.get(id))
            .or_else(|| self.renames.get(flat))
            .map(String::as_str)
    }

    fn drops(&self, source_id: Option<&str>, flat: &str) -> bool {
        source_id.is_some_and(|id| self.drops.contains(id)) || self.drops.contains(flat)
    }
}

// ---------------------------------------------------------------------------
// Header flattening
// ---------------------------------------------------------------------------

fn is_placeholder(level: &str) -> bool {
    let level = level.trim();
    level.is_empty() || level.starts_with("Unnamed")
}

/// Join the meaningful header levels into a single name.
pub fn flatten_header(levels: &[String]) -> String {
    let parts: Vec<&str> = levels
        .iter()
        .map(|l| l.trim())
        .filter(|l| !is_placeholder(l))
        .collect();
    if parts.is_empty() {
        UNNAMED_COLUMN.to_string()
    } else {
        parts.join(LEVEL_SEPARATOR)
    }
}

/// Make names unique: the first occurrence keeps its name, later ones get
/// the lowest free `_N` suffix.
pub fn dedupe_names(names: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let unique = if taken.contains(&name) {
            let mut n = 1usize;
            loop {
                let candidate = format!("{name}{LEVEL_SEPARATOR}{n}");
                if !taken.contains(&candidate) {
                    break candidate;
                }
                n += 1;
            }
        } else {
            name
        };
        taken.insert(unique.clone());
        out.push(unique);
    }
    out
}

// ---------------------------------------------------------------------------
// Cell coercion
// ---------------------------------------------------------------------------

/// Parse a numeric-looking string, tolerating thousands separators and a
/// leading `+`. Non-finite results are rejected.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let cleaned: String = s.trim_start_matches('+').chars().filter(|c| *c != ',').collect();
    if !cleaned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | 'e' | 'E'))
    {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn cell_text(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.trim()).unwrap_or("")
}

/// A column is stored as numbers only when the provider typed it numeric and
/// every non-empty cell actually parses.
fn column_is_numeric(raw: &RawTable, idx: usize) -> bool {
    raw.columns[idx].kind == ColumnKind::Numeric
        && raw.rows.iter().all(|row| {
            let text = cell_text(row, idx);
            text.is_empty() || parse_number(text).is_some()
        })
}

// ---------------------------------------------------------------------------
// Normalize
// ---------------------------------------------------------------------------

/// Convert a raw provider table into the canonical schema.
///
/// A raw table without rows yields a valid empty table that still carries
/// its columns.
pub fn normalize(raw: RawTable, map: &ColumnMap) -> StatTable {
    let mut kept: Vec<usize> = Vec::with_capacity(raw.columns.len());
    let mut names: Vec<String> = Vec::with_capacity(raw.columns.len());

    for (idx, col) in raw.columns.iter().enumerate() {
        let flat = flatten_header(&col.levels);
        let source_id = col.source_id.as_deref();
        if map.drops(source_id, &flat) {
            continue;
        }
        let name = map
            .lookup(source_id, &flat)
            .map(str::to_string)
            .unwrap_or(flat);
        kept.push(idx);
        names.push(name);
    }

    let columns = dedupe_names(names);
    let numeric: Vec<bool> = kept.iter().map(|&i| column_is_numeric(&raw, i)).collect();

    let rows: Vec<Row> = raw
        .rows
        .iter()
        .map(|raw_row| {
            kept.iter()
                .zip(&columns)
                .zip(&numeric)
                .map(|((&idx, name), &is_num)| {
                    let text = cell_text(raw_row, idx);
                    let cell = if text.is_empty() {
                        Cell::Null
                    } else if is_num {
                        parse_number(text).map(Cell::Number).unwrap_or(Cell::Null)
                    } else {
                        Cell::Text(text.to_string())
                    };
                    (name.clone(), cell)
                })
                .collect()
        })
        .collect();

    StatTable { columns, rows }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RawColumn;

    fn levels(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn shooting_raw() -> RawTable {
        let mut raw = RawTable::new(vec![
            RawColumn::new(&["", "Squad"], ColumnKind::Text).with_source_id("team"),
            RawColumn::new(&["Standard", "Gls"], ColumnKind::Numeric),
            RawColumn::new(&["Standard", "Sh"], ColumnKind::Numeric),
            RawColumn::new(&["Expected", "xG"], ColumnKind::Numeric),
        ]);
        raw.rows = vec![
            vec!["Man City".into(), "91".into(), "1,234".into(), "78.4".into()],
            vec!["Arsenal".into(), "88".into(), "".into(), "76.2".into()],
            vec!["Luton".into(), "52".into(), "411".into(), " ".into()],
        ];
        raw
    }

    #[test]
    fn flatten_joins_levels_and_skips_placeholders() {
        assert_eq!(flatten_header(&levels(&["Standard", "Gls"])), "Standard_Gls");
        assert_eq!(flatten_header(&levels(&["", "Squad"])), "Squad");
        assert_eq!(
            flatten_header(&levels(&["Unnamed: 0_level_0", "Rk"])),
            "Rk"
        );
        assert_eq!(flatten_header(&levels(&[" ", ""])), UNNAMED_COLUMN);
        assert_eq!(flatten_header(&levels(&["Per 90", "xG", "npxG"])), "Per 90_xG_npxG");
    }

    #[test]
    fn dedupe_suffixes_later_duplicates() {
        let out = dedupe_names(levels(&["xG", "team", "xG", "xG"]));
        assert_eq!(out, vec!["xG", "team", "xG_1", "xG_2"]);
    }

    #[test]
    fn dedupe_skips_taken_suffixes() {
        let out = dedupe_names(levels(&["a", "a_1", "a"]));
        assert_eq!(out, vec!["a", "a_1", "a_2"]);
    }

    #[test]
    fn parse_number_accepts_common_forms() {
        assert_eq!(parse_number("1,234"), Some(1234.0));
        assert_eq!(parse_number("+12"), Some(12.0));
        assert_eq!(parse_number("-0.5"), Some(-0.5));
        assert_eq!(parse_number("  7 "), Some(7.0));
        assert_eq!(parse_number("25-123"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("3-1"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn normalize_flattens_and_types_cells() {
        let map = ColumnMap::new().rename("team", "team");
        let table = normalize(shooting_raw(), &map);

        assert_eq!(
            table.columns,
            vec!["team", "Standard_Gls", "Standard_Sh", "Expected_xG"]
        );
        assert_eq!(table.num_rows(), 3);
        assert!(table.is_consistent());

        assert_eq!(table.rows[0]["team"], Cell::Text("Man City".into()));
        assert_eq!(table.rows[0]["Standard_Sh"], Cell::Number(1234.0));
        assert_eq!(table.rows[1]["Standard_Sh"], Cell::Null);
        assert_eq!(table.rows[2]["Expected_xG"], Cell::Null);
    }

    #[test]
    fn normalize_preserves_row_order() {
        let table = normalize(shooting_raw(), &ColumnMap::new());
        let teams: Vec<String> = table
            .column_values("Squad")
            .map(|c| c.to_string())
            .collect();
        assert_eq!(teams, vec!["Man City", "Arsenal", "Luton"]);
    }

    #[test]
    fn numeric_looking_text_column_stays_text() {
        let mut raw = RawTable::new(vec![RawColumn::new(&["Age"], ColumnKind::Text)]);
        raw.rows = vec![vec!["25".into()], vec!["31".into()]];
        let table = normalize(raw, &ColumnMap::new());
        assert_eq!(table.rows[0]["Age"], Cell::Text("25".into()));
    }

    #[test]
    fn partially_numeric_column_is_not_corrupted() {
        let mut raw = RawTable::new(vec![RawColumn::new(&["Score"], ColumnKind::Numeric)]);
        raw.rows = vec![vec!["2".into()], vec!["3–1".into()], vec!["".into()]];
        let table = normalize(raw, &ColumnMap::new());
        assert_eq!(table.rows[0]["Score"], Cell::Text("2".into()));
        assert_eq!(table.rows[1]["Score"], Cell::Text("3–1".into()));
        assert_eq!(table.rows[2]["Score"], Cell::Null);
    }

    #[test]
    fn map_renames_by_source_id_then_flat_name() {
        let mut raw = RawTable::new(vec![
            RawColumn::new(&["Home"], ColumnKind::Text).with_source_id("home_team"),
            RawColumn::new(&["xG"], ColumnKind::Numeric).with_source_id("home_xg"),
            RawColumn::new(&["xG"], ColumnKind::Numeric).with_source_id("away_xg"),
            RawColumn::new(&["Wk"], ColumnKind::Numeric),
        ]);
        raw.rows = vec![vec!["Burnley".into(), "0.3".into(), "2.1".into(), "1".into()]];
        let map = ColumnMap::new()
            .rename("home_team", "home_team")
            .rename("home_xg", "home_xg")
            .rename("away_xg", "away_xg")
            .rename("Wk", "week");
        let table = normalize(raw, &map);
        assert_eq!(table.columns, vec!["home_team", "home_xg", "away_xg", "week"]);
        assert_eq!(table.rows[0]["away_xg"], Cell::Number(2.1));
    }

    #[test]
    fn duplicate_headers_without_mapping_get_suffixes() {
        let mut raw = RawTable::new(vec![
            RawColumn::new(&["xG"], ColumnKind::Numeric),
            RawColumn::new(&["xG"], ColumnKind::Numeric),
        ]);
        raw.rows = vec![vec!["1.0".into(), "2.0".into()]];
        let table = normalize(raw, &ColumnMap::new());
        assert_eq!(table.columns, vec!["xG", "xG_1"]);
        assert_eq!(table.rows[0]["xG_1"], Cell::Number(2.0));
    }

    #[test]
    fn dropped_columns_disappear() {
        let mut raw = RawTable::new(vec![
            RawColumn::new(&["Player"], ColumnKind::Text),
            RawColumn::new(&["Matches"], ColumnKind::Text).with_source_id("matches"),
        ]);
        raw.rows = vec![vec!["Saka".into(), "Matches".into()]];
        let table = normalize(raw, &ColumnMap::new().drop_column("matches"));
        assert_eq!(table.columns, vec!["Player"]);
        assert_eq!(table.rows[0].len(), 1);
    }

    #[test]
    fn short_rows_are_padded_with_nulls() {
        let mut raw = RawTable::new(vec![
            RawColumn::new(&["a"], ColumnKind::Text),
            RawColumn::new(&["b"], ColumnKind::Numeric),
        ]);
        raw.rows = vec![vec!["x".into()]];
        let table = normalize(raw, &ColumnMap::new());
        assert_eq!(table.rows[0]["b"], Cell::Null);
    }

    #[test]
    fn empty_result_is_a_valid_table() {
        let raw = RawTable::new(vec![RawColumn::new(&["", "Squad"], ColumnKind::Text)]);
        let table = normalize(raw, &ColumnMap::new());
        assert_eq!(table.columns, vec!["Squad"]);
        assert!(table.rows.is_empty());
    }
}
