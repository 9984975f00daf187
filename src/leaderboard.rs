//! Reading the scraped leaderboard CSV.

use std::path::Path;

use crate::error::Result;
use crate::models::LeaderboardEntry;
use crate::normalize::parse_count;
use crate::table::Table;

pub const ARTIST_COLUMN: &str = "Artist";
pub const TITLE_COLUMN: &str = "Title";
pub const STREAMS_COLUMN: &str = "Streams";
pub const DAILY_COLUMN: &str = "Daily [streams]";

pub fn read_leaderboard(path: &Path) -> Result<Vec<LeaderboardEntry>> {
    let table = Table::read(path)?;
    entries_from_table(&table, &path.display().to_string())
}

/// Build entries from a leaderboard table. `Artist` and `Title` are
/// required; stream counts are optional and coerced.
pub fn entries_from_table(table: &Table, source: &str) -> Result<Vec<LeaderboardEntry>> {
    let artist_idx = table.require_column(ARTIST_COLUMN, source)?;
    let title_idx = table.require_column(TITLE_COLUMN, source)?;
    let streams_idx = table.column_index(STREAMS_COLUMN);
    let daily_idx = table
        .column_index(DAILY_COLUMN)
        .or_else(|| table.columns.iter().position(|c| c.contains("Daily")));

    let count_at = |row: &[String], idx: Option<usize>| idx.and_then(|i| parse_count(&row[i]));

    Ok(table
        .rows
        .iter()
        .enumerate()
        .map(|(order, row)| LeaderboardEntry {
            artist: row[artist_idx].clone(),
            title: row[title_idx].clone(),
            total_streams: count_at(row.as_slice(), streams_idx),
            daily_streams: count_at(row.as_slice(), daily_idx),
            original_rank_order: order,
        })
        .collect())
}
