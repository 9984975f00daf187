//! Checkpointed, resumable enrichment of leaderboard rows.
//!
//! The enriched artifact doubles as the progress log: on start, every row
//! already in it contributes a resume key and is carried over verbatim.
//! Rows whose search found nothing are not recorded, so they are searched
//! again on the next run.

use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::catalog::{ArtistItem, Catalog, TrackItem};
use crate::config::EnrichSettings;
use crate::error::{Error, Result};
use crate::http::Pause;
use crate::models::{EnrichStats, EnrichedRecord, LeaderboardEntry, ResumeKey};
use crate::progress::{log_progress, row_bar};
use crate::table::write_records;

const STAGE: &str = "enrich";

// ============================================================================
// Resume state
// ============================================================================

/// Rows of a previous run's artifact; a missing file means a fresh start.
pub fn read_prior_output(path: &Path) -> Result<Vec<EnrichedRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut rdr = csv::Reader::from_path(path)
        .map_err(|e| Error::Data(format!("cannot open {}: {}", path.display(), e)))?;
    rdr.deserialize()
        .collect::<std::result::Result<Vec<EnrichedRecord>, _>>()
        .map_err(|e| Error::Data(format!("cannot parse {}: {}", path.display(), e)))
}

/// Keys of the leaderboard rows already enriched in `prior`.
pub fn load_resume_keys(prior: &[EnrichedRecord]) -> FxHashSet<ResumeKey> {
    prior.iter().map(EnrichedRecord::resume_key).collect()
}

// ============================================================================
// Input preparation
// ============================================================================

#[derive(Debug, Default)]
pub struct PreparedEntries {
    pub entries: Vec<LeaderboardEntry>,
    pub dropped_incomplete: usize,
    pub dropped_duplicates: usize,
}

/// Drop rows without artist or title, keep the first row per normalized
/// (artist, title) by original order, then cap at `limit`.
pub fn prepare_entries(mut entries: Vec<LeaderboardEntry>, limit: usize) -> PreparedEntries {
    entries.sort_by_key(|e| e.original_rank_order);

    let mut prepared = PreparedEntries::default();
    let mut seen: FxHashSet<ResumeKey> = FxHashSet::default();
    for entry in entries {
        if entry.artist.trim().is_empty() || entry.title.trim().is_empty() {
            prepared.dropped_incomplete += 1;
            continue;
        }
        if !seen.insert(entry.resume_key()) {
            prepared.dropped_duplicates += 1;
            continue;
        }
        prepared.entries.push(entry);
    }
    prepared.entries.truncate(limit);
    prepared
}

/// Combine a leaderboard row with its top search hit and optional artist stats.
pub fn build_record(
    entry: &LeaderboardEntry,
    track: &TrackItem,
    artist: Option<&ArtistItem>,
) -> EnrichedRecord {
    let album = track.album.as_ref();
    let mut record = EnrichedRecord {
        track_id: track.id.clone(),
        name: track.name.clone(),
        artist_names: track.artist_names(),
        album_name: album.and_then(|a| a.name.clone()),
        release_date: album.and_then(|a| a.release_date.clone()),
        explicit: track.explicit,
        duration_ms: track.duration_ms,
        popularity: track.popularity,
        kworb_title: entry.title.clone(),
        kworb_artist: entry.artist.clone(),
        kworb_streams: entry.total_streams,
        kworb_daily_streams: entry.daily_streams,
        ..EnrichedRecord::default()
    };

    if let Some(artist) = artist {
        record.primary_artist_id = track.primary_artist().and_then(|a| a.id.clone());
        record.artist_followers = artist.followers.as_ref().and_then(|f| f.total);
        record.artist_popularity = artist.popularity;
        record.artist_genres = Some(artist.genres.join(", "));
    }
    record
}

// ============================================================================
// Checkpoints
// ============================================================================

/// Receives full snapshots of the accumulated rows.
pub trait CheckpointSink {
    fn write_snapshot(&mut self, rows: &[EnrichedRecord]) -> Result<()>;
}

impl<S: CheckpointSink + ?Sized> CheckpointSink for &mut S {
    fn write_snapshot(&mut self, rows: &[EnrichedRecord]) -> Result<()> {
        (**self).write_snapshot(rows)
    }
}

/// Rewrites the enriched CSV in full on every snapshot.
pub struct CsvCheckpoint {
    path: PathBuf,
}

impl CsvCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CheckpointSink for CsvCheckpoint {
    fn write_snapshot(&mut self, rows: &[EnrichedRecord]) -> Result<()> {
        write_records(&self.path, &EnrichedRecord::COLUMNS, rows)
    }
}

// ============================================================================
// Enricher
// ============================================================================

pub struct EnrichOutcome {
    pub records: Vec<EnrichedRecord>,
    pub stats: EnrichStats,
}

pub struct Enricher<'a, C, P, S> {
    catalog: &'a C,
    pause: P,
    sink: S,
    settings: &'a EnrichSettings,
}

impl<'a, C: Catalog, P: Pause, S: CheckpointSink> Enricher<'a, C, P, S> {
    pub fn new(catalog: &'a C, pause: P, sink: S, settings: &'a EnrichSettings) -> Self {
        Self {
            catalog,
            pause,
            sink,
            settings,
        }
    }

    /// Enrich `entries`, seeding the output with `prior` rows.
    ///
    /// Snapshots go to the sink every `checkpoint_every` appended rows and
    /// once at the end. A lookup failure stops the run; with
    /// `flush_on_error` the rows gathered so far are written first.
    pub fn run(&mut self, entries: Vec<LeaderboardEntry>, prior: Vec<EnrichedRecord>) -> Result<EnrichOutcome> {
        let start = Instant::now();
        let mut stats = EnrichStats {
            input_rows: entries.len(),
            ..EnrichStats::default()
        };

        let prepared = prepare_entries(entries, self.settings.limit);
        stats.dropped_incomplete = prepared.dropped_incomplete;
        stats.dropped_duplicates = prepared.dropped_duplicates;
        stats.queued_rows = prepared.entries.len();

        let mut done = load_resume_keys(&prior);
        let mut rows = prior;
        stats.resumed_rows = rows.len();
        if stats.resumed_rows > 0 {
            info!(stage = STAGE, rows = stats.resumed_rows, "resuming from saved rows");
        }

        let pb = row_bar(prepared.entries.len() as u64, STAGE);
        let result = self.process(&prepared.entries, &mut done, &mut rows, &mut stats, &pb);
        pb.finish_and_clear();

        if let Err(e) = result {
            if self.settings.flush_on_error {
                match self.sink.write_snapshot(&rows) {
                    Ok(()) => warn!(stage = STAGE, rows = rows.len(), kind = e.kind(), "flushed rows before stopping"),
                    Err(flush_err) => error!(stage = STAGE, error = %flush_err, "flush after failure also failed"),
                }
            }
            return Err(e);
        }

        self.sink.write_snapshot(&rows)?;
        stats.total_rows = rows.len();
        stats.elapsed_seconds = start.elapsed().as_secs_f64();
        Ok(EnrichOutcome { records: rows, stats })
    }

    fn process(
        &mut self,
        entries: &[LeaderboardEntry],
        done: &mut FxHashSet<ResumeKey>,
        rows: &mut Vec<EnrichedRecord>,
        stats: &mut EnrichStats,
        pb: &indicatif::ProgressBar,
    ) -> Result<()> {
        let total = entries.len() as u64;
        for (i, entry) in entries.iter().enumerate() {
            pb.inc(1);
            log_progress(STAGE, i as u64 + 1, total, 25);

            let key = entry.resume_key();
            if done.contains(&key) {
                stats.already_done += 1;
                continue;
            }
            pb.set_message(format!("{} - {}", entry.artist, entry.title));

            stats.searches += 1;
            let query = format!("{} {}", entry.title, entry.artist);
            let Some(track) = self.catalog.search_track(&query)? else {
                stats.not_found += 1;
                info!(stage = STAGE, title = %entry.title, artist = %entry.artist, "not found");
                self.pause.pause(self.settings.call_delay);
                continue;
            };

            let artist = match track.primary_artist().and_then(|a| a.id.as_deref()) {
                Some(artist_id) if self.settings.fetch_artist_stats => {
                    stats.artist_lookups += 1;
                    Some(self.catalog.artist(artist_id)?)
                }
                _ => None,
            };

            rows.push(build_record(entry, &track, artist.as_ref()));
            done.insert(key);
            stats.enriched += 1;

            let every = self.settings.checkpoint_every;
            if every > 0 && stats.enriched % every == 0 {
                self.sink.write_snapshot(rows)?;
                stats.checkpoints += 1;
                info!(stage = STAGE, rows = rows.len(), "checkpoint");
            }

            self.pause.pause(self.settings.call_delay);
        }
        Ok(())
    }
}
