// FBref page addresses and table ids for each selection.

use statslab_core::model::{DataType, League, Season, StatType};

pub const DEFAULT_BASE_URL: &str = "https://fbref.com";

/// FBref competition id and URL slug.
pub fn competition(league: League) -> (u32, &'static str) {
    match league {
        League::Epl => (9, "Premier-League"),
        League::Laliga => (12, "La-Liga"),
        League::Bundesliga => (20, "Bundesliga"),
        League::Seriea => (11, "Serie-A"),
        League::Ligue1 => (13, "Ligue-1"),
    }
}

/// Season as FBref writes it: `2023-2024`.
pub fn season_slug(season: &Season) -> String {
    format!("{}-{}", season.start_year(), season.end_year())
}

/// Page segment holding a season stat family.
pub fn stat_page(stat: StatType) -> &'static str {
    match stat {
        StatType::Standard => "stats",
        StatType::Shooting => "shooting",
        StatType::Passing => "passing",
        StatType::PassingTypes => "passing_types",
        StatType::GoalShotCreation => "gca",
        StatType::Defense => "defense",
        StatType::Possession => "possession",
        StatType::PlayingTime => "playingtime",
        StatType::Misc => "misc",
        StatType::Keeper => "keepers",
        StatType::KeeperAdv => "keepersadv",
        StatType::Summary => "summary",
    }
}

/// Suffix FBref uses in table ids for a stat family.
pub fn table_stat(stat: StatType) -> &'static str {
    match stat {
        StatType::GoalShotCreation => "gca",
        other => other.key(),
    }
}

fn trim_base(base: &str) -> &str {
    base.trim_end_matches('/')
}

/// Season page for team and player tables of one stat family.
pub fn season_stats_url(base: &str, league: League, season: &Season, stat: StatType) -> String {
    let (id, slug) = competition(league);
    let season = season_slug(season);
    format!(
        "{}/en/comps/{id}/{season}/{}/{season}-{slug}-Stats",
        trim_base(base),
        stat_page(stat)
    )
}

pub fn schedule_url(base: &str, league: League, season: &Season) -> String {
    let (id, slug) = competition(league);
    let season = season_slug(season);
    format!(
        "{}/en/comps/{id}/{season}/schedule/{season}-{slug}-Scores-and-Fixtures",
        trim_base(base)
    )
}

/// Resolve a site-relative link against the base URL.
pub fn absolute(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix('/') {
        format!("{}/{rest}", trim_base(base))
    } else {
        format!("{}/{href}", trim_base(base))
    }
}

/// Id of the season table for a team or player selection.
pub fn season_table_id(data_type: DataType, stat: StatType) -> Option<String> {
    match data_type {
        DataType::Team => Some(format!("stats_squads_{}_for", table_stat(stat))),
        DataType::Player => Some(format!("stats_{}", table_stat(stat))),
        DataType::Schedule | DataType::PlayerMatch => None,
    }
}

/// Schedule tables are ids like `sched_2023-2024_9_1`.
pub const SCHEDULE_TABLE_PREFIX: &str = "sched_";

/// Whether a match-report table id holds one team's `stat` table:
/// `stats_{team}_{stat}` for outfield players, `keeper_stats_{team}` for
/// goalkeepers.
pub fn is_match_table(id: &str, stat: StatType) -> bool {
    match stat {
        StatType::Keeper => id.starts_with("keeper_stats_"),
        _ => {
            let Some(rest) = id.strip_prefix("stats_") else {
                return false;
            };
            let Some(team) = rest.strip_suffix(&format!("_{}", table_stat(stat))) else {
                return false;
            };
            // Team ids are hex digits.
            !team.is_empty() && team.chars().all(|c| c.is_ascii_hexdigit())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
