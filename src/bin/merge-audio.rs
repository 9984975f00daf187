//! Join the enriched tracks with the audio-features dataset on
//! "normalized name - normalized primary artist".
//!
//! The dataset is expected to be extracted already; the first CSV in
//! --extract-dir is used.

use anyhow::Result;
use chart_enrich::cli::{CommonArgs, MergeArgs};
use chart_enrich::stages::{self, StageOutcome};
use clap::Parser;

#[derive(Parser)]
#[command(name = "merge-audio")]
#[command(about = "Merge enriched tracks with the audio features and lyrics dataset")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    merge: MergeArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.common.init();
    let job = args.merge.audio_job(&config.paths);

    let outcome = stages::settle(stages::AUDIO_STAGE, &job.output, stages::run_merge_audio(&job))?;
    if let StageOutcome::Written { stats, .. } = &outcome {
        args.common.write_stats(stats)?;
    }
    Ok(())
}
