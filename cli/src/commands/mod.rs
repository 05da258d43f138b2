pub mod check;
pub mod job;
pub mod list;
pub mod prune;
pub mod restore;
pub mod snapshot;

use crate::config::Config;
use anyhow::{Context as _, Result};
use indicatif::{ProgressBar, ProgressStyle};
use snapkeep_core::{Encoder, SnapshotStore};
use std::time::Duration;
use tracing::debug;

/// Everything a command needs, resolved once from flags, env and config.
pub struct Context {
    pub store: SnapshotStore,
    pub config: Config,
    pub quiet: bool,
}

impl Context {
    pub async fn load(cli: &crate::Cli) -> Result<Self> {
        let config = Config::load(cli.config.as_deref())?;
        let store_path = config.store_path(cli.store.as_deref());

        debug!("Using snapshot store at {}", store_path.display());
        let store = SnapshotStore::open(&store_path)
            .await
            .with_context(|| format!("Failed to open snapshot store {}", store_path.display()))?;

        Ok(Self {
            store,
            config,
            quiet: cli.quiet,
        })
    }

    pub fn encoder(&self) -> Encoder {
        Encoder::new(self.config.encode_options())
    }

    pub fn spinner(&self, message: impl Into<String>) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.into());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}
