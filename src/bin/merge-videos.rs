//! Join the audio-merged tracks with the most-viewed music videos dataset.
//! A track matches every video whose title contains its name; one match
//! per track is kept.

use anyhow::Result;
use chart_enrich::cli::{CommonArgs, MergeArgs};
use chart_enrich::stages::{self, StageOutcome};
use clap::Parser;

#[derive(Parser)]
#[command(name = "merge-videos")]
#[command(about = "Merge audio-merged tracks with the most-viewed music videos dataset")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    merge: MergeArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.common.init();
    let job = args.merge.video_job(&config.paths);

    let outcome = stages::settle(stages::VIDEO_STAGE, &job.output, stages::run_merge_videos(&job))?;
    if let StageOutcome::Written { stats, .. } = &outcome {
        args.common.write_stats(stats)?;
    }
    Ok(())
}
