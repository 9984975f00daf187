//! Run the whole pipeline: enrich the scraped leaderboard, join the audio
//! features dataset, then join the video dataset.
//!
//! Usage: chart-pipeline [--data-dir DIR] [--limit N] [--stats stats.json]

use anyhow::{Context, Result};
use chart_enrich::cli::{CommonArgs, EnrichArgs, MergeArgs};
use chart_enrich::models::StageStats;
use chart_enrich::progress::format_duration;
use chart_enrich::stages::{self, PipelineStats, StageOutcome};
use clap::Parser;
use std::time::Instant;
use tracing::info;

#[derive(Parser)]
#[command(name = "chart-pipeline")]
#[command(about = "Enrich the streaming leaderboard and merge it with the bulk datasets")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    enrich: EnrichArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = args.common.init();
    let start = Instant::now();

    std::fs::create_dir_all(&config.paths.data_dir).context("Failed to create data directory")?;
    let enrich_job = args.enrich.apply(&mut config);

    // Later stages read what the earlier ones wrote
    let merge_args = MergeArgs {
        spotify: Some(enrich_job.output.clone()),
        ..MergeArgs::default()
    };
    let audio_job = merge_args.audio_job(&config.paths);
    let video_job = MergeArgs {
        spotify: Some(audio_job.output.clone()),
        ..MergeArgs::default()
    }
    .video_job(&config.paths);

    let mut summary = PipelineStats::default();

    info!(stage = stages::ENRICH_STAGE, "step 1: enriching leaderboard");
    let outcome = stages::settle(
        stages::ENRICH_STAGE,
        &enrich_job.output,
        stages::run_enrich(&config, &enrich_job),
    )?;
    summary.enrich = outcome.stats().cloned();

    info!(stage = stages::AUDIO_STAGE, "step 2: merging audio features");
    let outcome = stages::settle(stages::AUDIO_STAGE, &audio_job.output, stages::run_merge_audio(&audio_job))?;
    summary.merge_audio = outcome.stats().cloned();

    info!(stage = stages::VIDEO_STAGE, "step 3: merging videos");
    let outcome = stages::settle(stages::VIDEO_STAGE, &video_job.output, stages::run_merge_videos(&video_job))?;
    if let StageOutcome::Written { path, .. } = &outcome {
        info!(path = %path.display(), "final dataset ready");
    }
    summary.merge_videos = outcome.stats().cloned();

    summary.log_phase("pipeline");
    args.common.write_stats(&summary)?;
    info!(
        data_dir = %config.paths.data_dir.display(),
        elapsed = %format_duration(start.elapsed()),
        "finished"
    );
    Ok(())
}
