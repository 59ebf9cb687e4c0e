// Selectable dimensions for the presentation layer: leagues, seasons, data
// types and their stat types, with labels and short descriptions.

use serde::Serialize;

use crate::catalog::CatalogMetadata;
use crate::model::{DataType, League, Season, StatType};

/// Seasons offered when no catalog metadata narrows the list, newest first.
pub const DEFAULT_SEASONS: [&str; 5] = ["2425", "2324", "2223", "2122", "2021"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeagueOption {
    pub value: League,
    pub name: &'static str,
    pub country: &'static str,
    pub id: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonOption {
    pub value: Season,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatOption {
    pub value: StatType,
    pub label: &'static str,
    pub desc: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataTypeOption {
    pub value: DataType,
    pub name: &'static str,
    pub description: &'static str,
    pub stats: Vec<StatOption>,
}

/// Everything a selector UI needs to populate its four controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionOptions {
    pub leagues: Vec<LeagueOption>,
    pub seasons: Vec<SeasonOption>,
    pub data_types: Vec<DataTypeOption>,
}

impl SelectionOptions {
    /// Every league and data type, with the default season list.
    pub fn all() -> Self {
        let seasons = DEFAULT_SEASONS
            .iter()
            .filter_map(|s| Season::parse(s).ok())
            .collect::<Vec<_>>();
        Self::build(League::ALL.to_vec(), seasons)
    }

    /// Options narrowed to the leagues and seasons a catalog actually holds.
    /// Seasons are listed newest first.
    pub fn for_metadata(metadata: &CatalogMetadata) -> Self {
        let leagues = League::ALL
            .into_iter()
            .filter(|l| metadata.leagues.contains(l.key()))
            .collect();
        let seasons = metadata
            .seasons
            .iter()
            .rev()
            .filter_map(|s| Season::parse(s).ok())
            .collect();
        Self::build(leagues, seasons)
    }

    fn build(leagues: Vec<League>, seasons: Vec<Season>) -> Self {
        Self {
            leagues: leagues
                .into_iter()
                .map(|l| LeagueOption {
                    value: l,
                    name: l.display_name(),
                    country: l.country(),
                    id: l.provider_id(),
                })
                .collect(),
            seasons: seasons
                .into_iter()
                .map(|s| SeasonOption {
                    label: s.label(),
                    value: s,
                })
                .collect(),
            data_types: DataType::ALL.into_iter().map(data_type_option).collect(),
        }
    }
}

fn data_type_option(data_type: DataType) -> DataTypeOption {
    let (name, description) = match data_type {
        DataType::Team => (
            "Team Season Stats",
            "Aggregated team statistics for the entire season",
        ),
        DataType::Player => (
            "Player Season Stats",
            "Individual player statistics aggregated over the season",
        ),
        DataType::Schedule => ("Match Schedule", "Match fixtures, results, and scores"),
        DataType::PlayerMatch => (
            "Player Match Stats",
            "Individual player stats for each match",
        ),
    };
    DataTypeOption {
        value: data_type,
        name,
        description,
        stats: data_type
            .stat_types()
            .iter()
            .map(|&stat| StatOption {
                value: stat,
                label: stat_label(stat),
                desc: stat_description(data_type, stat),
            })
            .collect(),
    }
}

pub fn stat_label(stat: StatType) -> &'static str {
    match stat {
        StatType::Standard => "Standard Stats",
        StatType::Shooting => "Shooting",
        StatType::Passing => "Passing",
        StatType::PassingTypes => "Pass Types",
        StatType::GoalShotCreation => "Shot Creation",
        StatType::Defense => "Defense",
        StatType::Possession => "Possession",
        StatType::PlayingTime => "Playing Time",
        StatType::Misc => "Miscellaneous",
        StatType::Keeper => "Goalkeeper",
        StatType::KeeperAdv => "GK Advanced",
        StatType::Summary => "Summary",
    }
}

/// Descriptions differ slightly between season and per-match tables.
pub fn stat_description(data_type: DataType, stat: StatType) -> &'static str {
    use DataType::*;
    use StatType::*;
    match (data_type, stat) {
        (Team, Standard) => "Goals, assists, xG, possession",
        (Team, Shooting) => "Shots, shot accuracy, goals per shot",
        (Team, Passing) => "Pass completion, progressive passes",
        (Team, PassingTypes) => "Crosses, through balls, switches",
        (Team, GoalShotCreation) => "SCA, GCA actions",
        (Team, Defense) => "Tackles, interceptions, blocks",
        (Team, Possession) => "Touches, carries, dribbles",
        (Team, Misc) => "Cards, fouls, aerials",

        (Player, Standard) => "Goals, assists, minutes played",
        (Player, Shooting) => "Shots, xG, shot distance",
        (Player, Passing) => "Pass completion, key passes",
        (Player, PassingTypes) => "Crosses, through balls",
        (Player, GoalShotCreation) => "SCA, GCA per 90",
        (Player, Defense) => "Tackles, pressures, blocks",
        (Player, Possession) => "Touches, dribbles, carries",
        (Player, PlayingTime) => "Minutes, starts, subs",
        (Player, Misc) => "Cards, fouls, recoveries",
        (Player, Keeper) => "Saves, clean sheets, GA",
        (Player, KeeperAdv) => "PSxG, crosses, sweeper",

        (PlayerMatch, Summary) => "Overall match performance",
        (PlayerMatch, Passing) => "Pass stats per match",
        (PlayerMatch, PassingTypes) => "Pass type breakdown",
        (PlayerMatch, Defense) => "Defensive actions",
        (PlayerMatch, Possession) => "Ball control stats",
        (PlayerMatch, Misc) => "Cards, fouls",
        (PlayerMatch, Keeper) => "GK stats per match",

        _ => "",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
