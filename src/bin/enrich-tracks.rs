//! Enrich the scraped leaderboard with catalog metadata.
//! Re-running resumes from the rows already in the output file.
//!
//! Usage: enrich-tracks [--input kworb_top_400.csv] [--out enriched.csv] [--limit N]

use anyhow::Result;
use chart_enrich::cli::{CommonArgs, EnrichArgs};
use chart_enrich::stages::{self, StageOutcome};
use clap::Parser;

#[derive(Parser)]
#[command(name = "enrich-tracks")]
#[command(about = "Look up leaderboard rows in the catalog API and save track and artist metadata")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    enrich: EnrichArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = args.common.init();
    let job = args.enrich.apply(&mut config);

    let outcome = stages::settle(stages::ENRICH_STAGE, &job.output, stages::run_enrich(&config, &job))?;
    if let StageOutcome::Written { stats, .. } = &outcome {
        args.common.write_stats(stats)?;
    }
    Ok(())
}
