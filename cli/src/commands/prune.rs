use anyhow::Result;
use clap::Args;
use snapkeep_core::{plan_prune, prune};

use super::Context;

#[derive(Args)]
pub struct PruneCommand {
    #[arg(long, help = "The number of most recent snapshots to keep")]
    snapshot_number: usize,

    #[arg(long, help = "Show what would be removed without deleting anything")]
    dry_run: bool,
}

impl PruneCommand {
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        let report = if self.dry_run {
            plan_prune(&ctx.store.list().await?, self.snapshot_number)
        } else {
            prune(&ctx.store, self.snapshot_number).await?
        };

        if report.is_noop() {
            println!(
                "Number of snapshots ({}) is within the limit of {}. No pruning needed.",
                report.kept.len(),
                self.snapshot_number
            );
            return Ok(());
        }

        let verb = if self.dry_run { "Would remove" } else { "Removed" };
        for id in &report.removed {
            println!("{} snapshot: {}", verb, id);
        }
        println!("Pruned to keep only the most recent {} snapshots.", report.kept.len());

        Ok(())
    }
}
