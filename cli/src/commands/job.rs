use anyhow::{Result, bail};
use clap::Args;
use snapkeep_core::{JobOptions, run_job};
use std::path::PathBuf;
use std::time::Duration;

use super::Context;

#[derive(Args)]
pub struct JobCommand {
    #[arg(long, help = "The directory to snapshot")]
    target_directory: PathBuf,

    #[arg(long, help = "Interval in seconds between snapshots")]
    interval: u64,

    #[arg(long, help = "Total duration in seconds for the job")]
    duration: u64,

    #[arg(long, help = "Prune to the most recent N snapshots after each capture")]
    keep: Option<usize>,

    #[arg(long, help = "Keep going when a snapshot fails")]
    keep_going: bool,
}

impl JobCommand {
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        if self.interval == 0 {
            bail!("--interval must be at least one second");
        }

        let options = JobOptions {
            interval: Duration::from_secs(self.interval),
            duration: Duration::from_secs(self.duration),
            keep_last: self.keep,
            stop_on_error: !self.keep_going,
        };

        let report = run_job(&ctx.store, &ctx.encoder(), &self.target_directory, &options).await?;

        println!("Job finished: {} snapshots taken", report.taken.len());
        if report.failed > 0 {
            println!("Failed snapshots: {}", report.failed);
        }

        Ok(())
    }
}
