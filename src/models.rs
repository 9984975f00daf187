//! Core data models for the enrichment and merge pipeline.
//!
//! This module contains the row types that flow between stages, the
//! derived key types used for resume and join decisions, and the per-stage
//! statistics.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::normalize::{normalize, primary_artist};

// ============================================================================
// Leaderboard Models
// ============================================================================

/// One scraped leaderboard row. Immutable once read.
#[derive(Clone, Debug, PartialEq)]
pub struct LeaderboardEntry {
    pub artist: String,
    pub title: String,
    pub total_streams: Option<u64>,
    pub daily_streams: Option<u64>,
    pub original_rank_order: usize, // 0-based data row index, stable tiebreak
}

impl LeaderboardEntry {
    pub fn resume_key(&self) -> ResumeKey {
        ResumeKey::new(&self.title, &self.artist)
    }
}

// ============================================================================
// Enrichment Output
// ============================================================================

/// One successfully matched leaderboard row, as persisted in the enriched CSV.
///
/// ## Field groups
///
/// - `track_id` .. `popularity`: top search result from the catalog API
/// - `kworb_*`: the source leaderboard row, kept verbatim. `kworb_title` and
///   `kworb_artist` are the resume key source on restart.
/// - `primary_artist_id`, `artist_*`: optional artist lookup; empty when
///   artist stats are disabled or the track had no credited artist
///
/// Field order is the CSV column order (`COLUMNS`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichedRecord {
    #[serde(rename = "sp_track_id")]
    pub track_id: String,
    pub name: String,
    pub artist_names: String, // Credited order, ", "-joined
    pub album_name: Option<String>,
    pub release_date: Option<String>,
    #[serde(deserialize_with = "lenient::opt_bool")]
    pub explicit: Option<bool>,
    #[serde(deserialize_with = "lenient::opt_i64")]
    pub duration_ms: Option<i64>,
    #[serde(deserialize_with = "lenient::opt_i64")]
    pub popularity: Option<i64>, // 0-100

    pub kworb_title: String,
    pub kworb_artist: String,
    #[serde(deserialize_with = "lenient::opt_count")]
    pub kworb_streams: Option<u64>,
    #[serde(deserialize_with = "lenient::opt_count")]
    pub kworb_daily_streams: Option<u64>,

    pub primary_artist_id: Option<String>,
    #[serde(deserialize_with = "lenient::opt_count")]
    pub artist_followers: Option<u64>,
    #[serde(deserialize_with = "lenient::opt_i64")]
    pub artist_popularity: Option<i64>,
    pub artist_genres: Option<String>, // ", "-joined
}

impl EnrichedRecord {
    /// CSV header, in serialization order.
    pub const COLUMNS: [&'static str; 16] = [
        "sp_track_id",
        "name",
        "artist_names",
        "album_name",
        "release_date",
        "explicit",
        "duration_ms",
        "popularity",
        "kworb_title",
        "kworb_artist",
        "kworb_streams",
        "kworb_daily_streams",
        "primary_artist_id",
        "artist_followers",
        "artist_popularity",
        "artist_genres",
    ];

    /// Key of the leaderboard row this record was built from.
    pub fn resume_key(&self) -> ResumeKey {
        ResumeKey::new(&self.kworb_title, &self.kworb_artist)
    }

    pub fn primary_artist(&self) -> &str {
        primary_artist(&self.artist_names)
    }
}

/// Coercions for cells written by other tools ("True", "215000.0").
mod lenient {
    use serde::{Deserialize, Deserializer};

    use crate::normalize::parse_count;

    pub fn opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        Ok(raw.and_then(|s| match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }))
    }

    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        Ok(raw.and_then(|s| {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.round() as i64)
            })
        }))
    }

    pub fn opt_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        Ok(raw.and_then(|s| parse_count(&s)))
    }
}

// ============================================================================
// Keys
// ============================================================================

/// Normalized (title, artist) of a leaderboard row. A key present in the
/// prior enriched artifact marks that row as done.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResumeKey {
    pub title: String,
    pub artist: String,
}

impl ResumeKey {
    pub fn new(title: &str, artist: &str) -> Self {
        Self {
            title: normalize(title),
            artist: normalize(artist),
        }
    }
}

/// Exact-join key: "normalized name - normalized primary artist".
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MergeKey(String);

impl MergeKey {
    pub fn new(name: &str, artist: &str) -> Self {
        MergeKey(format!("{} - {}", normalize(name), normalize(artist)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MergeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Shared reporting for per-stage statistics.
pub trait StageStats: Serialize {
    /// Log stats as a pretty JSON record
    fn log_phase(&self, stage: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            tracing::info!(stage, "stats\n{}", json);
        }
    }

    /// Write stats to a JSON file
    fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Counters for one enrichment run.
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct EnrichStats {
    // Input
    pub input_rows: usize,
    pub dropped_incomplete: usize, // Missing artist or title
    pub dropped_duplicates: usize,
    pub queued_rows: usize, // After dedup and row limit

    // Resume
    pub resumed_rows: usize,  // Rows seeded from the prior artifact
    pub already_done: usize,  // Queued rows skipped via resume key

    // Lookups
    pub searches: usize,
    pub not_found: usize,
    pub artist_lookups: usize,

    // Output
    pub enriched: usize, // Appended this run
    pub checkpoints: usize,
    pub total_rows: usize,

    pub elapsed_seconds: f64,
}

impl StageStats for EnrichStats {}

/// Counters for one merge stage.
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct MergeStats {
    pub left_rows: usize,
    pub right_rows: usize,
    pub joined_rows: usize, // Before dedup
    pub output_rows: usize,
}

impl MergeStats {
    pub fn collapsed_rows(&self) -> usize {
        self.joined_rows - self.output_rows
    }
}

impl StageStats for MergeStats {}
