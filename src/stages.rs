//! Stage runners shared by the binaries.
//!
//! Each runner reads its inputs, does the work, and writes one artifact.
//! `settle` turns recoverable failures into a logged skip so that a
//! pipeline keeps going with the stages that can still run.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::auth::TokenAuthClient;
use crate::catalog::SpotifyCatalog;
use crate::config::Config;
use crate::enrich::{read_prior_output, CsvCheckpoint, Enricher};
use crate::error::Result;
use crate::http::{RateLimitedFetcher, ReqwestTransport, ThreadPause};
use crate::leaderboard::read_leaderboard;
use crate::merge::{locate_dataset_csv, merge_containment, merge_exact};
use crate::models::{EnrichStats, MergeStats, StageStats};
use crate::progress::stage_spinner;
use crate::safety::validate_output_path;
use crate::table::Table;

pub const ENRICH_STAGE: &str = "enrich";
pub const AUDIO_STAGE: &str = "merge-audio";
pub const VIDEO_STAGE: &str = "merge-videos";

/// Inputs and output of the enrichment stage.
#[derive(Clone, Debug)]
pub struct EnrichJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Inputs and output of either merge stage.
#[derive(Clone, Debug)]
pub struct MergeJob {
    pub dataset: String,
    pub extract_dir: PathBuf,
    pub spotify: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug)]
pub enum StageOutcome<S> {
    Written { path: PathBuf, stats: S },
    Skipped { reason: String },
}

impl<S> StageOutcome<S> {
    pub fn stats(&self) -> Option<&S> {
        match self {
            StageOutcome::Written { stats, .. } => Some(stats),
            StageOutcome::Skipped { .. } => None,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, StageOutcome::Written { .. })
    }
}

/// Log a stage result. Recoverable errors become `Skipped`; the rest are
/// returned to the caller.
pub fn settle<S: StageStats>(stage: &str, output: &Path, result: Result<S>) -> Result<StageOutcome<S>> {
    let path = output.display().to_string();
    match result {
        Ok(stats) => {
            stats.log_phase(stage);
            info!(stage, path = %path, "artifact written");
            Ok(StageOutcome::Written {
                path: output.to_path_buf(),
                stats,
            })
        }
        Err(e) if e.is_recoverable() => {
            warn!(stage, path = %path, kind = e.kind(), "stage skipped: {}", e);
            Ok(StageOutcome::Skipped { reason: e.to_string() })
        }
        Err(e) => {
            error!(stage, path = %path, kind = e.kind(), "stage failed: {}", e);
            Err(e)
        }
    }
}

// ============================================================================
// Runners
// ============================================================================

/// Enrich the leaderboard against the catalog API, resuming from `job.output`.
pub fn run_enrich(config: &Config, job: &EnrichJob) -> Result<EnrichStats> {
    let credentials = config.credentials()?;
    validate_output_path(&job.output, &[job.input.as_path()])?;

    let entries = read_leaderboard(&job.input)?;
    let prior = read_prior_output(&job.output)?;

    let transport = ReqwestTransport::new(&config.retry)?;
    let credential = TokenAuthClient::new(&transport, &config.api.token_url, Some(credentials)).acquire()?;
    info!(stage = ENRICH_STAGE, rows = entries.len(), "token acquired");

    let fetcher = RateLimitedFetcher::new(&transport, ThreadPause, config.retry.clone());
    let catalog = SpotifyCatalog::new(fetcher, &config.api, credential);
    let outcome = Enricher::new(&catalog, ThreadPause, CsvCheckpoint::new(&job.output), &config.enrich)
        .run(entries, prior)?;
    Ok(outcome.stats)
}

/// Stage A: exact-key join with the audio-features dataset.
pub fn run_merge_audio(job: &MergeJob) -> Result<MergeStats> {
    run_merge(AUDIO_STAGE, job, merge_exact)
}

/// Stage B: title-containment join with the video dataset.
pub fn run_merge_videos(job: &MergeJob) -> Result<MergeStats> {
    run_merge(VIDEO_STAGE, job, merge_containment)
}

fn run_merge<F>(stage: &str, job: &MergeJob, join: F) -> Result<MergeStats>
where
    F: FnOnce(&Table, &Table) -> Result<(Table, MergeStats)>,
{
    let dataset_csv = locate_dataset_csv(&job.extract_dir, &job.dataset)?;
    validate_output_path(&job.output, &[job.spotify.as_path(), dataset_csv.as_path()])?;

    let spinner = stage_spinner(stage, "reading inputs");
    let enriched = Table::read(&job.spotify)?;
    let external = Table::read(&dataset_csv)?;
    info!(
        stage,
        dataset = %job.dataset,
        path = %dataset_csv.display(),
        rows = external.len(),
        "dataset loaded"
    );

    spinner.set_message("joining");
    let joined = join(&enriched, &external);
    spinner.finish_and_clear();
    let (table, stats) = joined?;

    table.write(&job.output)?;
    Ok(stats)
}

/// Per-stage stats of a full pipeline run, for `--stats`.
#[derive(Debug, Default, Serialize)]
pub struct PipelineStats {
    pub enrich: Option<EnrichStats>,
    pub merge_audio: Option<MergeStats>,
    pub merge_videos: Option<MergeStats>,
}

impl StageStats for PipelineStats {}
