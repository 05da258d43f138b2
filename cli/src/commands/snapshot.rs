use anyhow::{Context as _, Result};
use clap::Args;
use snapkeep_core::take_snapshot;
use std::path::PathBuf;

use super::Context;

#[derive(Args)]
pub struct SnapshotCommand {
    #[arg(long, help = "The directory to snapshot")]
    target_directory: PathBuf,
}

impl SnapshotCommand {
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        let pb = ctx.spinner(format!("Capturing {}...", self.target_directory.display()));
        let result = take_snapshot(&ctx.store, &ctx.encoder(), &self.target_directory).await;
        pb.finish_and_clear();

        let id = result.with_context(|| format!("Snapshot of {} failed", self.target_directory.display()))?;
        let summary = ctx.store.summary(&id).await?;

        println!("Snapshot saved to {}", ctx.store.path().join(&id).display());
        println!("  Files: {} ({} unique)", summary.file_count, summary.blob_count);
        println!("  Directory size: {} bytes", summary.directory_size);
        println!("  Stored size: {} bytes", summary.snapshot_size);

        Ok(())
    }
}
