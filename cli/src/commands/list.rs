use anyhow::{Result, anyhow};
use clap::Args;

use super::Context;

#[derive(Args)]
pub struct ListCommand {
    #[arg(long, help = "Output format (table, json)")]
    format: Option<String>,
}

impl ListCommand {
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        let format = self.format.as_deref().unwrap_or("table");
        let summaries = ctx.store.summaries().await?;
        let total: u64 = summaries.iter().map(|s| s.record_size).sum();

        match format {
            "table" => {
                if summaries.is_empty() {
                    println!("No snapshots found in {}", ctx.store.path().display());
                    return Ok(());
                }

                println!(
                    "{:<48} {:>7} {:>14} {:>14} {:>14}",
                    "Snapshot", "Files", "Directory", "Stored", "Record"
                );
                println!("{:-<101}", "");

                for summary in &summaries {
                    println!(
                        "{:<48} {:>7} {:>14} {:>14} {:>14}",
                        summary.id,
                        summary.file_count,
                        summary.directory_size,
                        summary.snapshot_size,
                        summary.record_size
                    );
                }

                println!();
                println!("Total size of all snapshots in database: {} bytes", total);
            }
            "json" => {
                let json = serde_json::json!({
                    "snapshots": summaries,
                    "total_size": total,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            _ => {
                return Err(anyhow!("Unsupported format: {}", format));
            }
        }

        Ok(())
    }
}
