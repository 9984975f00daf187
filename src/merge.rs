//! Joining the enriched table with the external bulk datasets.
//!
//! Stage A is an inner equi-join on `MergeKey` against the audio-features
//! dataset. Stage B pairs each row with every video whose normalized title
//! contains the row's normalized track name, then collapses back to one row
//! per track. When several videos contain the same name (a remix title that
//! contains the original title, say) the first by dataset order is kept.

use rustc_hash::{FxHashMap, FxHashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::{MergeKey, MergeStats};
use crate::normalize::{normalize, primary_artist};
use crate::table::Table;

// Enriched side
pub const NAME_COLUMN: &str = "name";
pub const ARTIST_NAMES_COLUMN: &str = "artist_names";
pub const PRIMARY_ARTIST_COLUMN: &str = "primary_artist";
pub const MERGE_KEY_COLUMN: &str = "merge_key";
pub const NAME_NORM_COLUMN: &str = "name_norm";

// Audio-features dataset
pub const TRACK_NAME_COLUMN: &str = "track_name";
pub const TRACK_ARTIST_COLUMN: &str = "track_artist";

// Video dataset
pub const VIDEO_COLUMN: &str = "Video";
pub const VIDEO_NORM_COLUMN: &str = "video_norm";

pub const LEFT_SUFFIX: &str = "_spotify";
pub const RIGHT_SUFFIX: &str = "_kaggle";

/// First `*.csv` (by file name) in an extracted dataset directory.
pub fn locate_dataset_csv(extract_dir: &Path, slug: &str) -> Result<PathBuf> {
    let entries = fs::read_dir(extract_dir).map_err(|e| {
        Error::Data(format!(
            "dataset {} not available in {}: {}",
            slug,
            extract_dir.display(),
            e
        ))
    })?;

    let mut csvs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    csvs.sort();

    csvs.into_iter().next().ok_or_else(|| {
        Error::Data(format!(
            "no CSV files for dataset {} in {}",
            slug,
            extract_dir.display()
        ))
    })
}

// ============================================================================
// Output rows
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Output header plus, per output column, the side and index it comes from.
#[derive(Debug, Default)]
struct ColumnPlan {
    names: Vec<String>,
    sources: Vec<(Side, usize)>,
}

impl ColumnPlan {
    fn push(&mut self, name: String, side: Side, idx: usize) {
        self.names.push(name);
        self.sources.push((side, idx));
    }
}

/// One joined pair of source rows, materialized through a `ColumnPlan`.
#[derive(Clone, Copy, Debug)]
pub struct MergedRow<'a> {
    pub left: &'a [String],
    pub right: &'a [String],
}

impl MergedRow<'_> {
    fn cells(&self, plan: &ColumnPlan) -> Vec<String> {
        plan.sources
            .iter()
            .map(|&(side, idx)| match side {
                Side::Left => self.left[idx].clone(),
                Side::Right => self.right[idx].clone(),
            })
            .collect()
    }
}

// ============================================================================
// Stage A: exact key join
// ============================================================================

/// Inner join of `enriched` and `audio` on `MergeKey`, one row per key.
///
/// Adds `primary_artist` and `merge_key` to the enriched side and
/// `merge_key` to the audio side. Other columns present on both sides are
/// suffixed `_spotify` / `_kaggle`.
pub fn merge_exact(enriched: &Table, audio: &Table) -> Result<(Table, MergeStats)> {
    let name_idx = enriched.require_column(NAME_COLUMN, "enriched data")?;
    let artists_idx = enriched.require_column(ARTIST_NAMES_COLUMN, "enriched data")?;
    let track_idx = audio.require_column(TRACK_NAME_COLUMN, "audio dataset")?;
    let track_artist_idx = audio.require_column(TRACK_ARTIST_COLUMN, "audio dataset")?;

    let mut left = enriched.clone();
    left.push_column(PRIMARY_ARTIST_COLUMN, |row| primary_artist(&row[artists_idx]).to_string());
    let primary_idx = left.require_column(PRIMARY_ARTIST_COLUMN, "enriched data")?;
    left.push_column(MERGE_KEY_COLUMN, |row| {
        MergeKey::new(&row[name_idx], &row[primary_idx]).to_string()
    });
    let left_key = left.require_column(MERGE_KEY_COLUMN, "enriched data")?;

    let mut right = audio.clone();
    right.push_column(MERGE_KEY_COLUMN, |row| {
        MergeKey::new(&row[track_idx], &row[track_artist_idx]).to_string()
    });
    let right_key = right.require_column(MERGE_KEY_COLUMN, "audio dataset")?;

    let plan = exact_plan(&left, &right, right_key);

    let mut by_key: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
    for (i, row) in right.rows.iter().enumerate() {
        by_key.entry(row[right_key].as_str()).or_default().push(i);
    }

    let mut stats = MergeStats {
        left_rows: enriched.len(),
        right_rows: audio.len(),
        ..MergeStats::default()
    };
    let mut out = Table::new(plan.names.clone());
    let mut seen: FxHashSet<&str> = FxHashSet::default();

    for row in &left.rows {
        let key = row[left_key].as_str();
        let Some(matches) = by_key.get(key) else {
            continue;
        };
        stats.joined_rows += matches.len();
        if seen.insert(key) {
            let merged = MergedRow {
                left: row,
                right: &right.rows[matches[0]],
            };
            out.rows.push(merged.cells(&plan));
        }
    }

    if out.is_empty() {
        return Err(Error::Merge(format!(
            "no {} values shared between enriched data ({} rows) and audio dataset ({} rows)",
            MERGE_KEY_COLUMN, stats.left_rows, stats.right_rows
        )));
    }
    stats.output_rows = out.len();
    Ok((out, stats))
}

fn exact_plan(left: &Table, right: &Table, right_key: usize) -> ColumnPlan {
    let shared: FxHashSet<&str> = left
        .columns
        .iter()
        .filter(|c| c.as_str() != MERGE_KEY_COLUMN && right.columns.contains(c))
        .map(String::as_str)
        .collect();

    let mut plan = ColumnPlan::default();
    for (i, col) in left.columns.iter().enumerate() {
        let name = if shared.contains(col.as_str()) {
            format!("{}{}", col, LEFT_SUFFIX)
        } else {
            col.clone()
        };
        plan.push(name, Side::Left, i);
    }
    for (i, col) in right.columns.iter().enumerate() {
        if i == right_key {
            continue;
        }
        let name = if shared.contains(col.as_str()) {
            format!("{}{}", col, RIGHT_SUFFIX)
        } else {
            col.clone()
        };
        plan.push(name, Side::Right, i);
    }
    plan
}

// ============================================================================
// Stage B: containment join
// ============================================================================

/// Pair each enriched row with every video whose normalized `Video` title
/// contains the row's normalized `name`, then keep one row per name.
///
/// Columns are the enriched columns (plus `name_norm`) followed by the
/// video columns (plus `video_norm`) not already present; on a shared name
/// the video value wins.
///
/// A row whose normalized name is empty matches no video. Every title
/// contains the empty string, so such a row would otherwise pair with the
/// whole dataset.
pub fn merge_containment(enriched: &Table, videos: &Table) -> Result<(Table, MergeStats)> {
    let name_idx = enriched.require_column(NAME_COLUMN, "enriched data")?;
    let video_idx = videos.require_column(VIDEO_COLUMN, "video dataset")?;

    let mut left = enriched.clone();
    left.push_column(NAME_NORM_COLUMN, |row| normalize(&row[name_idx]));
    let name_norm = left.require_column(NAME_NORM_COLUMN, "enriched data")?;

    let mut right = videos.clone();
    right.push_column(VIDEO_NORM_COLUMN, |row| normalize(&row[video_idx]));
    let video_norm = right.require_column(VIDEO_NORM_COLUMN, "video dataset")?;

    let plan = containment_plan(&left, &right);

    let mut stats = MergeStats {
        left_rows: enriched.len(),
        right_rows: videos.len(),
        ..MergeStats::default()
    };

    // Expand: every (track, video) pair that matches
    let mut joined: Vec<(&str, Vec<String>)> = Vec::new();
    for row in &left.rows {
        let needle = row[name_norm].as_str();
        if needle.is_empty() {
            continue;
        }
        for video in right.rows.iter().filter(|v| v[video_norm].contains(needle)) {
            let merged = MergedRow { left: row, right: video };
            joined.push((row[name_idx].as_str(), merged.cells(&plan)));
        }
    }
    stats.joined_rows = joined.len();

    // Contract: drop exact duplicates, then keep the first row per name
    let mut seen_rows: FxHashSet<Vec<String>> = FxHashSet::default();
    let mut seen_names: FxHashSet<&str> = FxHashSet::default();
    let mut out = Table::new(plan.names.clone());
    for (name, cells) in joined {
        if seen_rows.contains(&cells) {
            continue;
        }
        seen_rows.insert(cells.clone());
        if seen_names.insert(name) {
            out.rows.push(cells);
        }
    }

    if out.is_empty() {
        return Err(Error::Merge(format!(
            "no video titles contain any of {} track names ({} videos)",
            stats.left_rows, stats.right_rows
        )));
    }
    stats.output_rows = out.len();
    Ok((out, stats))
}

fn containment_plan(left: &Table, right: &Table) -> ColumnPlan {
    let mut plan = ColumnPlan::default();
    for (i, col) in left.columns.iter().enumerate() {
        match right.column_index(col) {
            Some(j) => plan.push(col.clone(), Side::Right, j),
            None => plan.push(col.clone(), Side::Left, i),
        }
    }
    for (j, col) in right.columns.iter().enumerate() {
        if left.column_index(col).is_none() {
            plan.push(col.clone(), Side::Right, j);
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(data: &str) -> Table {
        Table::from_reader(data.as_bytes()).unwrap()
    }

    fn column<'a>(t: &'a Table, name: &str) -> Vec<&'a str> {
        let idx = t.column_index(name).unwrap();
        t.rows.iter().map(|r| r[idx].as_str()).collect()
    }

    // ------------------------------------------------------------------
    // Stage A
    // ------------------------------------------------------------------

    #[test]
    fn test_exact_join_collapses_duplicate_bulk_rows() {
        let enriched = table(
            "sp_track_id,name,artist_names\n\
             t1,Blinding Lights,\"The Weeknd, Rosalía\"\n",
        );
        let audio = table(
            "track_name,track_artist,danceability\n\
             Blinding Lights,The Weeknd,0.51\n\
             Blinding Lights,The Weeknd,0.51\n",
        );
        let (out, stats) = merge_exact(&enriched, &audio).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(stats.joined_rows, 2);
        assert_eq!(stats.collapsed_rows(), 1);
        assert_eq!(column(&out, "merge_key"), vec!["blinding lights - the weeknd"]);
        assert_eq!(column(&out, "primary_artist"), vec!["The Weeknd"]);
        assert_eq!(column(&out, "danceability"), vec!["0.51"]);
    }

    #[test]
    fn test_exact_join_is_inner_and_keeps_left_order() {
        let enriched = table(
            "name,artist_names\n\
             Shape of You,Ed Sheeran\n\
             Unmatched,Nobody\n\
             god's plan,DRAKE\n",
        );
        let audio = table(
            "track_name,track_artist\n\
             God's Plan , Drake\n\
             Shape Of You,ed sheeran\n\
             Other,Someone\n",
        );
        let (out, stats) = merge_exact(&enriched, &audio).unwrap();
        assert_eq!(column(&out, "name"), vec!["Shape of You", "god's plan"]);
        assert_eq!(stats.left_rows, 3);
        assert_eq!(stats.right_rows, 3);
        assert_eq!(stats.output_rows, 2);
    }

    #[test]
    fn test_exact_join_column_layout_and_suffixes() {
        let enriched = table("name,artist_names,popularity\nHello,Adele,80\n");
        let audio = table("track_name,track_artist,popularity\nHello,Adele,75\n");
        let (out, _) = merge_exact(&enriched, &audio).unwrap();
        assert_eq!(
            out.columns,
            vec![
                "name",
                "artist_names",
                "popularity_spotify",
                "primary_artist",
                "merge_key",
                "track_name",
                "track_artist",
                "popularity_kaggle",
            ]
        );
        assert_eq!(out.rows[0][2], "80");
        assert_eq!(out.rows[0][7], "75");
    }

    #[test]
    fn test_exact_join_missing_columns_is_data_error() {
        let enriched = table("name\nHello\n");
        let audio = table("track_name,track_artist\nHello,Adele\n");
        let err = merge_exact(&enriched, &audio).unwrap_err();
        assert_eq!(err.kind(), "data");
        assert!(err.to_string().contains("'artist_names'"));

        let enriched = table("name,artist_names\nHello,Adele\n");
        let audio = table("track_name\nHello\n");
        assert!(merge_exact(&enriched, &audio)
            .unwrap_err()
            .to_string()
            .contains("'track_artist'"));
    }

    #[test]
    fn test_exact_join_without_overlap_is_merge_error() {
        let enriched = table("name,artist_names\nHello,Adele\n");
        let audio = table("track_name,track_artist\nHello,Lionel Richie\n");
        let err = merge_exact(&enriched, &audio).unwrap_err();
        assert_eq!(err.kind(), "merge");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_exact_join_rerun_on_own_output_does_not_duplicate_key_columns() {
        let enriched = table("name,artist_names,primary_artist,merge_key\nHello,Adele,stale,stale\n");
        let audio = table("track_name,track_artist\nHello,Adele\n");
        let (out, _) = merge_exact(&enriched, &audio).unwrap();
        assert_eq!(out.columns.iter().filter(|c| *c == "merge_key").count(), 1);
        assert_eq!(column(&out, "merge_key"), vec!["hello - adele"]);
    }

    // ------------------------------------------------------------------
    // Stage B
    // ------------------------------------------------------------------

    #[test]
    fn test_containment_join_one_to_many_collapses_to_first() {
        let enriched = table("name,artist_names\nBlinding Lights,The Weeknd\nNo Video,Nobody\n");
        let videos = table(
            "Video,Views\n\
             The Weeknd - Blinding Lights (Official Video),800000000\n\
             The Weeknd - Blinding Lights (Lyrics),90000000\n\
             Something Else,5\n",
        );
        let (out, stats) = merge_containment(&enriched, &videos).unwrap();
        assert_eq!(stats.joined_rows, 2);
        assert_eq!(out.len(), 1);
        assert_eq!(column(&out, "Views"), vec!["800000000"]);
        assert_eq!(column(&out, "name_norm"), vec!["blinding lights"]);
        assert_eq!(
            column(&out, "video_norm"),
            vec!["the weeknd - blinding lights (official video)"]
        );
    }

    #[test]
    fn test_containment_join_picks_first_container_even_if_remix() {
        let enriched = table("name\nStay\n");
        let videos = table("Video\nStay (Remix) - Someone Else\nThe Kid LAROI - Stay\n");
        let (out, _) = merge_containment(&enriched, &videos).unwrap();
        assert_eq!(column(&out, "Video"), vec!["Stay (Remix) - Someone Else"]);
    }

    #[test]
    fn test_containment_join_external_wins_on_collision() {
        let enriched = table("name,popularity\nHello,80\n");
        let videos = table("Video,popularity,Channel\nAdele - Hello,high,AdeleVEVO\n");
        let (out, _) = merge_containment(&enriched, &videos).unwrap();
        assert_eq!(
            out.columns,
            vec!["name", "popularity", "name_norm", "Video", "Channel", "video_norm"]
        );
        assert_eq!(out.rows[0][1], "high");
    }

    #[test]
    fn test_containment_join_empty_name_never_matches() {
        let enriched = table("name\n  \n");
        let videos = table("Video\nAnything\n");
        let err = merge_containment(&enriched, &videos).unwrap_err();
        assert_eq!(err.kind(), "merge");
    }

    #[test]
    fn test_containment_join_missing_video_column() {
        let enriched = table("name\nHello\n");
        let videos = table("Title\nHello\n");
        let err = merge_containment(&enriched, &videos).unwrap_err();
        assert_eq!(err.kind(), "data");
        assert!(err.to_string().contains("'Video'"));
    }

    // ------------------------------------------------------------------
    // Dataset files
    // ------------------------------------------------------------------

    #[test]
    fn test_locate_dataset_csv_picks_first_by_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.csv"), "x\n").unwrap();
        fs::write(dir.path().join("a.CSV"), "x\n").unwrap();
        fs::write(dir.path().join("readme.txt"), "x\n").unwrap();
        let found = locate_dataset_csv(dir.path(), "owner/data").unwrap();
        assert_eq!(found.file_name().unwrap(), "a.CSV");
    }

    #[test]
    fn test_locate_dataset_csv_reports_slug() {
        let dir = tempfile::tempdir().unwrap();
        let err = locate_dataset_csv(dir.path(), "owner/data").unwrap_err();
        assert_eq!(err.kind(), "data");
        assert!(err.to_string().contains("owner/data"));

        let err = locate_dataset_csv(&dir.path().join("missing"), "owner/data").unwrap_err();
        assert!(err.is_recoverable());
    }
}
