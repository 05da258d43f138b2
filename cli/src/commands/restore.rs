use anyhow::{Context as _, Result};
use clap::Args;
use snapkeep_core::restore;
use std::path::PathBuf;

use super::Context;

#[derive(Args)]
pub struct RestoreCommand {
    #[arg(long, help = "The snapshot file name to restore from")]
    snapshot_file: String,

    #[arg(long, help = "Where to restore the snapshot to")]
    output_directory: PathBuf,
}

impl RestoreCommand {
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        let pb = ctx.spinner(format!("Restoring {}...", self.snapshot_file));
        let result = restore(&ctx.store, &self.snapshot_file, &self.output_directory).await;
        pb.finish_and_clear();

        let report = result.with_context(|| format!("Restore of {} failed", self.snapshot_file))?;

        println!(
            "Restored snapshot '{}' to '{}' ({} files, {} bytes)",
            report.id,
            self.output_directory.display(),
            report.files_restored,
            report.bytes_written
        );

        Ok(())
    }
}
