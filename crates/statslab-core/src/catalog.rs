// The assembled catalog: every normalized table addressed by
// league_season and `dataType:statType`, plus per-league-season schedules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{
    league_season_key, split_league_season, DataType, League, Season, SelectionKey, StatType,
};
use crate::table::StatTable;

/// Build provenance stored alongside the catalog.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogMetadata {
    pub last_updated: Option<DateTime<Utc>>,
    pub leagues: BTreeSet<String>,
    pub seasons: BTreeSet<String>,
}

impl CatalogMetadata {
    /// Metadata for a finished build: leagues and seasons are those actually
    /// present in the catalog, not merely requested.
    pub fn describe(catalog: &Catalog, completed_at: DateTime<Utc>) -> Self {
        let (leagues, seasons) = catalog.present_dimensions();
        Self {
            last_updated: Some(completed_at),
            leagues: leagues.into_iter().map(|l| l.key().to_string()).collect(),
            seasons: seasons.into_iter().map(String::from).collect(),
        }
    }
}

/// Nested collection of normalized tables.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// `league_season` -> `dataType:statType` -> table.
    #[serde(default)]
    pub tables: BTreeMap<String, BTreeMap<String, StatTable>>,
    /// `league_season` -> schedule.
    #[serde(default)]
    pub schedules: BTreeMap<String, StatTable>,
}

/// (league_season, entry key) -> (columns, row count). Schedules use the
/// entry key `schedule`.
pub type ShapeSummary = BTreeMap<(String, String), (Vec<String>, usize)>;

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the table for `key`. Returns the replaced table.
    pub fn insert(&mut self, key: &SelectionKey, table: StatTable) -> Option<StatTable> {
        let outer = key.league_season();
        match key.entry_key() {
            Some(entry) => self.tables.entry(outer).or_default().insert(entry, table),
            None => self.schedules.insert(outer, table),
        }
    }

    pub fn get(&self, key: &SelectionKey) -> Option<&StatTable> {
        let outer = key.league_season();
        match key.entry_key() {
            Some(entry) => self.tables.get(&outer)?.get(&entry),
            None => self.schedules.get(&outer),
        }
    }

    /// Number of tables, schedules included.
    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum::<usize>() + self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Leagues and seasons that have at least one table.
    pub fn present_dimensions(&self) -> (BTreeSet<League>, BTreeSet<Season>) {
        let mut leagues = BTreeSet::new();
        let mut seasons = BTreeSet::new();
        let populated = self
            .tables
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(k, _)| k)
            .chain(self.schedules.keys());
        for key in populated {
            if let Some((league, season)) = split_league_season(key) {
                leagues.insert(league);
                seasons.insert(season);
            }
        }
        (leagues, seasons)
    }

    /// Column set and row count of every entry.
    pub fn shape_summary(&self) -> ShapeSummary {
        let mut out = ShapeSummary::new();
        for (outer, entries) in &self.tables {
            for (entry, table) in entries {
                out.insert(
                    (outer.clone(), entry.clone()),
                    (table.columns.clone(), table.num_rows()),
                );
            }
        }
        for (outer, table) in &self.schedules {
            out.insert(
                (outer.clone(), DataType::Schedule.key().to_string()),
                (table.columns.clone(), table.num_rows()),
            );
        }
        out
    }

    /// Clubs in a league season, read from the standard team table and
    /// falling back to any other team table.
    pub fn teams(&self, league: League, season: &Season) -> Vec<String> {
        let Some(entries) = self.tables.get(&league_season_key(league, season)) else {
            return Vec::new();
        };
        let standard = format!("{}:{}", DataType::Team.key(), StatType::Standard.key());
        let team_prefix = format!("{}:", DataType::Team.key());
        entries
            .get(&standard)
            .or_else(|| {
                entries
                    .iter()
                    .find(|(k, _)| k.starts_with(&team_prefix))
                    .map(|(_, t)| t)
            })
            .map(StatTable::team_names)
            .unwrap_or_default()
    }
}

/// The persisted artifact: metadata plus the catalog's maps at top level.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub metadata: CatalogMetadata,
    #[serde(flatten)]
    pub catalog: Catalog,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Cell, Row};
    use chrono::TimeZone;

    fn key(league: League, season: &str, dt: DataType, stat: Option<StatType>) -> SelectionKey {
        SelectionKey::new(league, Season::parse(season).unwrap(), dt, stat)
    }

    fn team_table(teams: &[&str]) -> StatTable {
        StatTable {
            columns: vec!["team".into(), "Gls".into()],
            rows: teams
                .iter()
                .map(|t| {
                    let mut r = Row::new();
                    r.insert("team".into(), Cell::Text(t.to_string()));
                    r.insert("Gls".into(), Cell::Number(1.0));
                    r
                })
                .collect(),
        }
    }

    #[test]
    fn insert_then_get_by_composite_key() {
        let mut catalog = Catalog::new();
        let k = key(League::Epl, "2324", DataType::Team, Some(StatType::Shooting));
        assert!(catalog.insert(&k, team_table(&["Arsenal"])).is_none());
        assert_eq!(catalog.get(&k).map(StatTable::num_rows), Some(1));
        assert!(catalog.tables["epl_2324"].contains_key("team:shooting"));
    }

    #[test]
    fn insert_is_last_write_wins() {
        let mut catalog = Catalog::new();
        let k = key(League::Epl, "2324", DataType::Player, Some(StatType::Standard));
        catalog.insert(&k, team_table(&["a", "b"]));
        let old = catalog.insert(&k, team_table(&["c"])).unwrap();
        assert_eq!(old.num_rows(), 2);
        assert_eq!(catalog.get(&k).unwrap().num_rows(), 1);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn schedules_live_in_their_own_map() {
        let mut catalog = Catalog::new();
        let k = key(League::Laliga, "2223", DataType::Schedule, None);
        catalog.insert(&k, StatTable::default());
        assert!(catalog.tables.is_empty());
        assert!(catalog.schedules.contains_key("laliga_2223"));
        assert!(catalog.get(&k).is_some());
    }

    #[test]
    fn metadata_lists_present_dimensions_only() {
        let mut catalog = Catalog::new();
        catalog.insert(
            &key(League::Epl, "2324", DataType::Team, Some(StatType::Standard)),
            team_table(&["Arsenal"]),
        );
        catalog.insert(
            &key(League::Seriea, "2223", DataType::Schedule, None),
            StatTable::default(),
        );
        // An outer entry with no tables does not count.
        catalog.tables.insert("ligue1_2122".into(), BTreeMap::new());

        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let meta = CatalogMetadata::describe(&catalog, at);
        assert_eq!(meta.last_updated, Some(at));
        assert_eq!(
            meta.leagues.into_iter().collect::<Vec<_>>(),
            vec!["epl", "seriea"]
        );
        assert_eq!(
            meta.seasons.into_iter().collect::<Vec<_>>(),
            vec!["2223", "2324"]
        );
    }

    #[test]
    fn teams_prefers_standard_table() {
        let mut catalog = Catalog::new();
        catalog.insert(
            &key(League::Epl, "2324", DataType::Team, Some(StatType::Shooting)),
            team_table(&["Luton"]),
        );
        let s = Season::parse("2324").unwrap();
        assert_eq!(catalog.teams(League::Epl, &s), vec!["Luton"]);

        catalog.insert(
            &key(League::Epl, "2324", DataType::Team, Some(StatType::Standard)),
            team_table(&["Chelsea", "Arsenal"]),
        );
        assert_eq!(catalog.teams(League::Epl, &s), vec!["Arsenal", "Chelsea"]);
        assert!(catalog.teams(League::Ligue1, &s).is_empty());
    }

    #[test]
    fn document_serializes_with_flat_maps() {
        let mut doc = CatalogDocument::default();
        doc.catalog.insert(
            &key(League::Epl, "2324", DataType::Team, Some(StatType::Standard)),
            team_table(&["Arsenal"]),
        );
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value["metadata"]["last_updated"].is_null());
        assert_eq!(
            value["tables"]["epl_2324"]["team:standard"]["columns"],
            serde_json::json!(["team", "Gls"])
        );
        assert!(value["schedules"].as_object().unwrap().is_empty());

        let back: CatalogDocument = serde_json::from_value(value).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn shape_summary_covers_schedules() {
        let mut catalog = Catalog::new();
        catalog.insert(
            &key(League::Epl, "2324", DataType::Schedule, None),
            team_table(&["x", "y"]),
        );
        let summary = catalog.shape_summary();
        let entry = &summary[&("epl_2324".to_string(), "schedule".to_string())];
        assert_eq!(entry.1, 2);
    }
}
