//! The `cache` command: manage the persistent artifact store.

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::Path;

use crate::cache::FsStore;
use crate::manifest::Manifest;

#[derive(Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    action: CacheAction,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove all cache entries
    Clean,
    /// Show cache location and entry count
    Info,
}

impl CacheCommand {
    pub fn execute(self, manifest_path: &Path) -> Result<()> {
        // The manifest may override the cache location; fall back to the
        // default root when no manifest is present.
        let root = match Manifest::load(manifest_path) {
            Ok(manifest) => match &manifest.project.cache_dir {
                Some(dir) => manifest.base_dir.join(dir),
                None => FsStore::default_root()?,
            },
            Err(_) => FsStore::default_root()?,
        };
        let store = FsStore::open(root)?;

        match self.action {
            CacheAction::Clean => {
                let removed = store.clear()?;
                println!("removed {removed} cache entr{}", if removed == 1 { "y" } else { "ies" });
            }
            CacheAction::Info => {
                println!("cache root: {}", store.root().display());
                println!("entries: {}", store.entry_count()?);
            }
        }
        Ok(())
    }
}
