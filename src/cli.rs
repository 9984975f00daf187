//! Argument groups shared by the binaries.

use anyhow::Context;
use clap::Args;
use std::path::PathBuf;

use crate::config::{Config, DataPaths};
use crate::models::StageStats;
use crate::stages::{EnrichJob, MergeJob};
use crate::{logging, progress};

#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Data directory [default: $CHART_DATA_DIR or ./data]
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Env file with SPOTIFY_CLIENT_ID / SPOTIFY_CLIENT_SECRET [default: ./.env]
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Hide progress bars and log periodic progress records instead
    #[arg(long)]
    pub log_only: bool,

    #[arg(short, long)]
    pub verbose: bool,

    /// Write run statistics as JSON to this path
    #[arg(long)]
    pub stats: Option<PathBuf>,
}

impl CommonArgs {
    /// Set up logging and progress mode, then load the run configuration.
    pub fn init(&self) -> Config {
        logging::init(self.verbose);
        progress::set_log_only(self.log_only);
        Config::from_env(self.env_file.as_deref(), self.data_dir.clone())
    }

    pub fn write_stats<S: StageStats>(&self, stats: &S) -> anyhow::Result<()> {
        if let Some(path) = &self.stats {
            stats
                .write_to_file(path)
                .with_context(|| format!("Failed to write stats to {}", path.display()))?;
            tracing::info!(path = %path.display(), "stats written");
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct EnrichArgs {
    /// Scraped leaderboard CSV [default: <data-dir>/kworb_top_400.csv]
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Enriched output CSV, also the resume source [default: <data-dir>/spotify_from_kworb_400.csv]
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Maximum leaderboard rows to process [default: 400]
    #[arg(long)]
    pub limit: Option<usize>,

    /// Rewrite the output every N newly enriched rows [default: 50]
    #[arg(long)]
    pub checkpoint_every: Option<usize>,

    /// Skip the per-artist followers/popularity/genres lookup
    #[arg(long)]
    pub no_artist_stats: bool,

    /// Do not write accumulated rows when a lookup fails fatally
    #[arg(long)]
    pub no_flush_on_error: bool,
}

impl EnrichArgs {
    /// Fold overrides into `config.enrich` and resolve the job paths.
    pub fn apply(&self, config: &mut Config) -> EnrichJob {
        let settings = &mut config.enrich;
        if let Some(limit) = self.limit {
            settings.limit = limit;
        }
        if let Some(every) = self.checkpoint_every {
            settings.checkpoint_every = every;
        }
        settings.fetch_artist_stats &= !self.no_artist_stats;
        settings.flush_on_error &= !self.no_flush_on_error;

        EnrichJob {
            input: self.input.clone().unwrap_or_else(|| config.paths.leaderboard()),
            output: self.out.clone().unwrap_or_else(|| config.paths.enriched()),
        }
    }
}

/// Paths for one merge stage; every flag falls back to the stage default.
#[derive(Args, Debug, Clone, Default)]
pub struct MergeArgs {
    /// Dataset slug, used to name the dataset in diagnostics
    #[arg(long)]
    pub dataset: Option<String>,

    /// Directory holding the extracted dataset CSV
    #[arg(long)]
    pub extract_dir: Option<PathBuf>,

    /// Left-hand input CSV
    #[arg(long)]
    pub spotify: Option<PathBuf>,

    /// Output CSV
    #[arg(long)]
    pub out: Option<PathBuf>,
}

impl MergeArgs {
    /// Stage A: enriched table joined with the audio-features dataset.
    pub fn audio_job(&self, paths: &DataPaths) -> MergeJob {
        self.job(
            DataPaths::AUDIO_DATASET,
            paths.audio_extract_dir(),
            paths.enriched(),
            paths.audio_merged(),
        )
    }

    /// Stage B: stage A output joined with the video dataset.
    pub fn video_job(&self, paths: &DataPaths) -> MergeJob {
        self.job(
            DataPaths::VIDEO_DATASET,
            paths.video_extract_dir(),
            paths.audio_merged(),
            paths.video_merged(),
        )
    }

    fn job(&self, dataset: &str, extract_dir: PathBuf, spotify: PathBuf, out: PathBuf) -> MergeJob {
        MergeJob {
            dataset: self.dataset.clone().unwrap_or_else(|| dataset.to_string()),
            extract_dir: self.extract_dir.clone().unwrap_or(extract_dir),
            spotify: self.spotify.clone().unwrap_or(spotify),
            output: self.out.clone().unwrap_or(out),
        }
    }
}
