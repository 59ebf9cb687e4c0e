// FBref pages -> raw provider tables. Pure functions over page text so they
// can be exercised against saved pages.

use statslab_core::model::{DataType, StatType};
use statslab_core::source::{ColumnKind, RawColumn, RawTable};

use crate::html::{self, HtmlError, HtmlTable};
use crate::urls;

/// A played fixture with a match report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMatch {
    /// `{date} {home}-{away}`, the value of the `game` column.
    pub game: String,
    pub report_url: String,
}

/// FBref right-aligns numeric cells; any other alignment marks a text
/// column. Columns with no values at all are treated as numeric.
fn column_kind(table: &HtmlTable, idx: usize) -> ColumnKind {
    let numeric = table
        .rows
        .iter()
        .filter_map(|row| row.get(idx))
        .filter(|cell| !cell.text.is_empty())
        .all(|cell| cell.class.split_whitespace().any(|c| c == "right"));
    if numeric {
        ColumnKind::Numeric
    } else {
        ColumnKind::Text
    }
}

/// Header levels, `data-stat` ids and cell text of a parsed table.
pub fn raw_from_html(table: &HtmlTable) -> RawTable {
    let columns = table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let group = col.group.as_deref().unwrap_or("");
            let mut raw = RawColumn::new(&[group, col.label.as_str()], column_kind(table, idx));
            raw.source_id = col.data_stat.clone().filter(|s| !s.is_empty());
            raw
        })
        .collect::<Vec<_>>();
    let width = columns.len();

    let mut raw = RawTable::new(columns);
    raw.rows = table
        .rows
        .iter()
        .map(|row| {
            (0..width)
                .map(|i| row.get(i).map(|c| c.text.clone()).unwrap_or_default())
                .collect()
        })
        .collect();
    raw
}

/// Team or player season table for one stat family.
pub fn season_table(page: &str, data_type: DataType, stat: StatType) -> Result<RawTable, HtmlError> {
    let id = urls::season_table_id(data_type, stat)
        .ok_or_else(|| HtmlError::TableNotFound(format!("{data_type}:{stat}")))?;
    let table = html::find_table(page, &id)?;
    Ok(raw_from_html(&table))
}

pub fn schedule_table(page: &str) -> Result<HtmlTable, HtmlError> {
    html::find_tables(page, |id| id.starts_with(urls::SCHEDULE_TABLE_PREFIX))?
        .into_iter()
        .next()
        .ok_or_else(|| HtmlError::TableNotFound(format!("{}*", urls::SCHEDULE_TABLE_PREFIX)))
}

/// Schedule rows with the match-report link resolved to an absolute URL.
/// Rows with no values at all are dropped.
pub fn schedule_raw(schedule: &HtmlTable, base_url: &str) -> RawTable {
    let mut raw = raw_from_html(schedule);
    if let Some(idx) = schedule.column_index("match_report") {
        for (raw_row, row) in raw.rows.iter_mut().zip(&schedule.rows) {
            if let Some(href) = row.get(idx).and_then(|c| c.href.as_deref()) {
                raw_row[idx] = urls::absolute(base_url, href);
            }
        }
    }
    raw.rows.retain(|row| row.iter().any(|c| !c.is_empty()));
    raw
}

/// Fixtures that have a score and a match report, in schedule order.
pub fn played_matches(schedule: &HtmlTable, base_url: &str) -> Vec<PlayedMatch> {
    let text = |row: &[html::HtmlCell], stat: &str| {
        schedule
            .cell(row, stat)
            .map(|c| c.text.clone())
            .unwrap_or_default()
    };
    schedule
        .rows
        .iter()
        .filter_map(|row| {
            if text(row, "score").is_empty() {
                return None;
            }
            let href = schedule.cell(row, "match_report")?.href.as_deref()?;
            Some(PlayedMatch {
                game: format!(
                    "{} {}-{}",
                    text(row, "date"),
                    text(row, "home_team"),
                    text(row, "away_team")
                ),
                report_url: urls::absolute(base_url, href),
            })
        })
        .collect()
}

/// Team name from a match-report caption such as
/// `Arsenal Player Stats Table`.
pub fn team_from_caption(caption: &str) -> &str {
    [" Player Stats Table", " Goalkeeper Stats Table", " Stats Table"]
        .iter()
        .find_map(|suffix| caption.strip_suffix(suffix))
        .unwrap_or(caption)
        .trim()
}

/// Both teams' tables for `stat` from one match report, stacked, with `game`
/// and `team` columns in front.
pub fn match_stat_tables(page: &str, stat: StatType, game: &str) -> Result<RawTable, HtmlError> {
    let tables = html::find_tables(page, |id| urls::is_match_table(id, stat))?;
    if tables.is_empty() {
        return Err(HtmlError::TableNotFound(format!("{} match tables", stat.key())));
    }

    let mut combined: Option<RawTable> = None;
    for table in &tables {
        let team = table
            .caption
            .as_deref()
            .map(team_from_caption)
            .unwrap_or(table.id.as_str());
        let mut raw = raw_from_html(table);
        raw.prepend_constant("team", team);
        raw.prepend_constant("game", game);
        match combined.as_mut() {
            Some(acc) => acc.append(raw),
            None => combined = Some(raw),
        }
    }
    Ok(combined.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
