use anyhow::{Result, bail};
use clap::Args;
use tracing::warn;

use super::Context;

#[derive(Args)]
pub struct CheckCommand {
    #[arg(long, help = "Check a single snapshot instead of the whole store")]
    snapshot_file: Option<String>,
}

impl CheckCommand {
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        let ids = match &self.snapshot_file {
            Some(id) => vec![id.clone()],
            None => ctx.store.list().await?,
        };

        let mut corrupt = 0;
        for id in &ids {
            match ctx.store.verify(id).await {
                Ok(record) => println!("ok       {} ({} files)", id, record.file_count()),
                Err(e) if e.is_corrupt() => {
                    warn!("{}", e);
                    println!("CORRUPT  {}", id);
                    corrupt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if corrupt > 0 {
            bail!("{} of {} snapshots failed verification", corrupt, ids.len());
        }
        println!("{} snapshots verified", ids.len());
        Ok(())
    }
}
