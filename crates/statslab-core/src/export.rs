// Presentation support: CSV export of full tables, the truncated preview
// shown on screen, and download file naming.

use std::io::{Read, Write};

use crate::model::{DataType, League, Season, StatType};
use crate::table::{Cell, Row, StatTable};

/// Columns shown in an on-screen preview.
pub const DISPLAY_MAX_COLUMNS: usize = 12;
/// Rows shown in an on-screen preview.
pub const DISPLAY_MAX_ROWS: usize = 50;

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Write the whole table as CSV: a header row of `columns`, then one record
/// per row. Fields containing a comma, a double quote or a line break are
/// quoted, with inner quotes doubled. `Null` is written as an empty field.
pub fn write_csv<W: Write>(table: &StatTable, out: W) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(out);
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(
            table
                .columns
                .iter()
                .map(|c| row.get(c).map(Cell::to_string).unwrap_or_default()),
        )?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_csv_string(table: &StatTable) -> Result<String, csv::Error> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    String::from_utf8(buf)
        .map_err(|e| csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Parse CSV written by `write_csv`.
///
/// CSV carries no types: every non-empty field comes back as `Text` holding
/// exactly what `Cell`'s `Display` produced, and every empty field comes
/// back as `Null`. An empty `Text` therefore reads back as `Null`.
pub fn read_csv<R: Read>(input: R) -> Result<StatTable, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(input);
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut table = StatTable::new(columns);
    for record in reader.records() {
        let record = record?;
        let row: Row = table
            .columns
            .iter()
            .zip(record.iter())
            .map(|(col, field)| {
                let cell = if field.is_empty() {
                    Cell::Null
                } else {
                    Cell::Text(field.to_string())
                };
                (col.clone(), cell)
            })
            .collect();
        table.rows.push(row);
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// Display-ready slice of a table plus the untruncated dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
    pub total_columns: usize,
}

impl TablePreview {
    pub fn is_truncated(&self) -> bool {
        self.rows.len() < self.total_rows || self.columns.len() < self.total_columns
    }
}

/// The first `max_columns` columns of the first `max_rows` rows.
pub fn preview(table: &StatTable, max_columns: usize, max_rows: usize) -> TablePreview {
    let columns: Vec<String> = table.columns.iter().take(max_columns).cloned().collect();
    let rows = table
        .rows
        .iter()
        .take(max_rows)
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).map(Cell::to_string).unwrap_or_default())
                .collect()
        })
        .collect();
    TablePreview {
        columns,
        rows,
        total_rows: table.num_rows(),
        total_columns: table.num_columns(),
    }
}

// ---------------------------------------------------------------------------
// File naming
// ---------------------------------------------------------------------------

/// `{dataType}_{leagues}_{seasons}[_{statType}][_{first two teams}].csv`.
/// Whitespace and path separators in team names become underscores.
pub fn export_file_name(
    data_type: DataType,
    leagues: &[League],
    seasons: &[Season],
    stat_type: Option<StatType>,
    teams: &[String],
) -> String {
    let mut name = format!(
        "{}_{}_{}",
        data_type.key(),
        leagues.iter().map(League::key).collect::<Vec<_>>().join("_"),
        seasons.iter().map(Season::as_str).collect::<Vec<_>>().join("_"),
    );
    if data_type.takes_stat() {
        if let Some(stat) = stat_type.or(data_type.default_stat()) {
            name.push('_');
            name.push_str(stat.key());
        }
    }
    if !teams.is_empty() {
        for team in teams.iter().take(2) {
            name.push('_');
            name.extend(team.chars().map(|c| {
                if c.is_whitespace() || c == '/' || c == '\\' {
                    '_'
                } else {
                    c
                }
            }));
        }
    }
    name.push_str(".csv");
    name
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
