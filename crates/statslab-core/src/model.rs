// Selection dimensions: leagues, seasons, data types, stat types and the
// composite key that addresses a single table in the catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("unknown league `{0}`")]
    UnknownLeague(String),

    #[error("invalid season `{0}`: expected four digits in YYMM form (e.g. 2324)")]
    InvalidSeason(String),

    #[error("unknown data type `{0}`")]
    UnknownDataType(String),

    #[error("unknown stat type `{0}`")]
    UnknownStatType(String),
}

// ---------------------------------------------------------------------------
// League
// ---------------------------------------------------------------------------

/// One of the five supported top-tier domestic competitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum League {
    Epl,
    Laliga,
    Bundesliga,
    Seriea,
    Ligue1,
}

impl League {
    pub const ALL: [League; 5] = [
        League::Epl,
        League::Laliga,
        League::Bundesliga,
        League::Seriea,
        League::Ligue1,
    ];

    /// Short key used in catalog identifiers (`epl`, `laliga`, ...).
    pub fn key(&self) -> &'static str {
        match self {
            League::Epl => "epl",
            League::Laliga => "laliga",
            League::Bundesliga => "bundesliga",
            League::Seriea => "seriea",
            League::Ligue1 => "ligue1",
        }
    }

    /// Case-insensitive lookup by short key.
    pub fn from_key(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        League::ALL.into_iter().find(|l| l.key() == s)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            League::Epl => "Premier League",
            League::Laliga => "La Liga",
            League::Bundesliga => "Bundesliga",
            League::Seriea => "Serie A",
            League::Ligue1 => "Ligue 1",
        }
    }

    pub fn country(&self) -> &'static str {
        match self {
            League::Epl => "England",
            League::Laliga => "Spain",
            League::Bundesliga => "Germany",
            League::Seriea => "Italy",
            League::Ligue1 => "France",
        }
    }

    /// Provider-neutral competition identifier, also written into the
    /// `league` column of every fetched table.
    pub fn provider_id(&self) -> &'static str {
        match self {
            League::Epl => "ENG-Premier League",
            League::Laliga => "ESP-La Liga",
            League::Bundesliga => "GER-Bundesliga",
            League::Seriea => "ITA-Serie A",
            League::Ligue1 => "FRA-Ligue 1",
        }
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// Season
// ---------------------------------------------------------------------------

/// A competition year encoded as four digits: start and end year, two digits
/// each (`2324` is 2023-24).
///
/// Only the shape is validated. A season that was never fetched is still a
/// valid key; looking it up simply yields nothing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Season(String);

impl Season {
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        let s = s.trim();
        if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Season(s.to_string()))
        } else {
            Err(KeyError::InvalidSeason(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Four-digit calendar year the season starts in. Two-digit years from
    /// 70 upward are read as 19xx.
    pub fn start_year(&self) -> u16 {
        let yy: u16 = self.0[..2].parse().unwrap_or(0);
        if yy >= 70 {
            1900 + yy
        } else {
            2000 + yy
        }
    }

    pub fn end_year(&self) -> u16 {
        self.start_year() + 1
    }

    /// Human-readable label, e.g. `2023-24`.
    pub fn label(&self) -> String {
        format!("{}-{}", self.start_year(), &self.0[2..])
    }
}

impl TryFrom<String> for Season {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Season::parse(&value)
    }
}

impl From<Season> for String {
    fn from(season: Season) -> Self {
        season.0
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Stat type
// ---------------------------------------------------------------------------

/// Sub-category of metrics within a data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatType {
    Standard,
    Shooting,
    Passing,
    PassingTypes,
    GoalShotCreation,
    Defense,
    Possession,
    PlayingTime,
    Misc,
    Keeper,
    KeeperAdv,
    Summary,
}

pub const TEAM_STAT_TYPES: &[StatType] = &[
    StatType::Standard,
    StatType::Shooting,
    StatType::Passing,
    StatType::PassingTypes,
    StatType::GoalShotCreation,
    StatType::Defense,
    StatType::Possession,
    StatType::Misc,
];

pub const PLAYER_STAT_TYPES: &[StatType] = &[
    StatType::Standard,
    StatType::Shooting,
    StatType::Passing,
    StatType::PassingTypes,
    StatType::GoalShotCreation,
    StatType::Defense,
    StatType::Possession,
    StatType::PlayingTime,
    StatType::Misc,
    StatType::Keeper,
    StatType::KeeperAdv,
];

pub const PLAYER_MATCH_STAT_TYPES: &[StatType] = &[
    StatType::Summary,
    StatType::Passing,
    StatType::PassingTypes,
    StatType::Defense,
    StatType::Possession,
    StatType::Misc,
    StatType::Keeper,
];

impl StatType {
    pub const ALL: [StatType; 12] = [
        StatType::Standard,
        StatType::Shooting,
        StatType::Passing,
        StatType::PassingTypes,
        StatType::GoalShotCreation,
        StatType::Defense,
        StatType::Possession,
        StatType::PlayingTime,
        StatType::Misc,
        StatType::Keeper,
        StatType::KeeperAdv,
        StatType::Summary,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            StatType::Standard => "standard",
            StatType::Shooting => "shooting",
            StatType::Passing => "passing",
            StatType::PassingTypes => "passing_types",
            StatType::GoalShotCreation => "goal_shot_creation",
            StatType::Defense => "defense",
            StatType::Possession => "possession",
            StatType::PlayingTime => "playing_time",
            StatType::Misc => "misc",
            StatType::Keeper => "keeper",
            StatType::KeeperAdv => "keeper_adv",
            StatType::Summary => "summary",
        }
    }

    pub fn from_key(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        StatType::ALL.into_iter().find(|t| t.key() == s)
    }
}

impl fmt::Display for StatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// Data type
// ---------------------------------------------------------------------------

/// Subject of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Team,
    Player,
    Schedule,
    PlayerMatch,
}

impl DataType {
    pub const ALL: [DataType; 4] = [
        DataType::Team,
        DataType::Player,
        DataType::Schedule,
        DataType::PlayerMatch,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            DataType::Team => "team",
            DataType::Player => "player",
            DataType::Schedule => "schedule",
            DataType::PlayerMatch => "player_match",
        }
    }

    pub fn from_key(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        DataType::ALL.into_iter().find(|d| d.key() == s)
    }

    /// The stat-type family valid for this data type. Empty for schedules.
    pub fn stat_types(&self) -> &'static [StatType] {
        match self {
            DataType::Team => TEAM_STAT_TYPES,
            DataType::Player => PLAYER_STAT_TYPES,
            DataType::PlayerMatch => PLAYER_MATCH_STAT_TYPES,
            DataType::Schedule => &[],
        }
    }

    pub fn takes_stat(&self) -> bool {
        !matches!(self, DataType::Schedule)
    }

    /// Stat type used when a selection omits one.
    pub fn default_stat(&self) -> Option<StatType> {
        match self {
            DataType::Team | DataType::Player => Some(StatType::Standard),
            DataType::PlayerMatch => Some(StatType::Summary),
            DataType::Schedule => None,
        }
    }

    pub fn supports(&self, stat: StatType) -> bool {
        self.stat_types().contains(&stat)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// SelectionKey
// ---------------------------------------------------------------------------

/// Composite address of one table: (league, season, data type, stat type).
///
/// Schedules have no stat-type dimension; `new` discards any stat supplied
/// for them so that equal selections compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SelectionKey {
    pub league: League,
    pub season: Season,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stat_type: Option<StatType>,
}

impl SelectionKey {
    pub fn new(
        league: League,
        season: Season,
        data_type: DataType,
        stat_type: Option<StatType>,
    ) -> Self {
        let stat_type = if data_type.takes_stat() { stat_type } else { None };
        Self {
            league,
            season,
            data_type,
            stat_type,
        }
    }

    /// Build a key from presentation-layer strings.
    ///
    /// The stat string is not even parsed for schedules. For the other data
    /// types a missing or blank stat falls back to the data type's default.
    pub fn parse(
        league: &str,
        season: &str,
        data_type: &str,
        stat_type: Option<&str>,
    ) -> Result<Self, KeyError> {
        let league =
            League::from_key(league).ok_or_else(|| KeyError::UnknownLeague(league.to_string()))?;
        let season = Season::parse(season)?;
        let data_type = DataType::from_key(data_type)
            .ok_or_else(|| KeyError::UnknownDataType(data_type.to_string()))?;

        let stat_type = if !data_type.takes_stat() {
            None
        } else {
            match stat_type.map(str::trim).filter(|s| !s.is_empty()) {
                Some(s) => Some(
                    StatType::from_key(s).ok_or_else(|| KeyError::UnknownStatType(s.to_string()))?,
                ),
                None => data_type.default_stat(),
            }
        };

        Ok(Self::new(league, season, data_type, stat_type))
    }

    /// Outer catalog key: `"{league}_{season}"`.
    pub fn league_season(&self) -> String {
        league_season_key(self.league, &self.season)
    }

    /// Inner catalog key `"dataType:statType"`. `None` for schedules, which
    /// live in their own map.
    pub fn entry_key(&self) -> Option<String> {
        if !self.data_type.takes_stat() {
            return None;
        }
        let stat = self.stat_type.map(|s| s.key()).unwrap_or("");
        Some(format!("{}:{}", self.data_type.key(), stat))
    }

    /// Whether the stat type belongs to the data type's family (schedules
    /// are always supported).
    pub fn is_supported(&self) -> bool {
        match (self.data_type.takes_stat(), self.stat_type) {
            (false, _) => true,
            (true, Some(stat)) => self.data_type.supports(stat),
            (true, None) => false,
        }
    }
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entry_key() {
            Some(entry) => write!(f, "{}/{}", self.league_season(), entry),
            None => write!(f, "{}/{}", self.league_season(), self.data_type),
        }
    }
}

pub fn league_season_key(league: League, season: &Season) -> String {
    format!("{}_{}", league.key(), season.as_str())
}

/// Split a `"{league}_{season}"` key back into its parts.
pub fn split_league_season(key: &str) -> Option<(League, Season)> {
    let (league, season) = key.split_once('_')?;
    Some((League::from_key(league)?, Season::parse(season).ok()?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
