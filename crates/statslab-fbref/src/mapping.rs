// FBref column mapping table: provider `data-stat` ids renamed to the
// catalog's canonical identifier columns. Every other column keeps its
// flattened header name (e.g. `Standard_Gls`).

use statslab_core::normalize::ColumnMap;

/// `data-stat` id -> canonical column name.
pub const RENAMES: &[(&str, &str)] = &[
    ("league", "league"),
    ("season", "season"),
    ("game", "game"),
    ("team", "team"),
    ("player", "player"),
    ("shirtnumber", "jersey_number"),
    ("nationality", "nation"),
    ("position", "pos"),
    ("age", "age"),
    ("birth_year", "born"),
    ("minutes", "min"),
    ("gameweek", "week"),
    ("dayofweek", "day"),
    ("date", "date"),
    ("start_time", "time"),
    ("home_team", "home_team"),
    ("home_xg", "home_xg"),
    ("score", "score"),
    ("away_xg", "away_xg"),
    ("away_team", "away_team"),
    ("attendance", "attendance"),
    ("venue", "venue"),
    ("referee", "referee"),
    ("match_report", "match_report"),
    ("notes", "notes"),
];

/// Link-only and rank columns that carry no data.
pub const DROPS: &[&str] = &["matches", "ranker"];

pub fn fbref_column_map() -> ColumnMap {
    let map = RENAMES
        .iter()
        .fold(ColumnMap::new(), |map, (from, to)| map.rename(from, to));
    DROPS.iter().fold(map, |map, id| map.drop_column(id))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
