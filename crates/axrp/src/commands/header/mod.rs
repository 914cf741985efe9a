use std::{path::Path, time::Duration};

use axrp_archive::{
    read::{DEFAULT_MAX_DECOMPRESSED_SIZE, DEFAULT_MAX_HEADER_LENGTH},
    LoadOptions, LoadedHeader,
};
use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use tokio_util::sync::CancellationToken;

pub mod diff;
pub mod info;
pub mod tree;

#[derive(clap::Subcommand)]
pub enum HeaderCommands {
    /// Compare the headers of two archives
    Diff(diff::DiffArgs),
    /// Summarize the header of an archive
    Info(info::InfoArgs),
    /// Print the group tree of an archive
    Tree(tree::TreeArgs),
}

impl HeaderCommands {
    pub async fn handle(&self, cancel: &CancellationToken) -> Result<()> {
        match self {
            HeaderCommands::Diff(diff) => diff.handle(cancel).await,
            HeaderCommands::Info(info) => info.handle(cancel).await,
            HeaderCommands::Tree(tree) => tree.handle(cancel).await,
        }
    }
}

/// Limits applied while loading a header
#[derive(Args)]
pub struct LoadArgs {
    /// Largest compressed header block to accept, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_HEADER_LENGTH)]
    max_header_length: u32,

    /// Largest decompressed header to accept, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_DECOMPRESSED_SIZE)]
    max_decompressed_size: u64,

    /// Give up when a read waits longer than this many milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,
}

impl LoadArgs {
    pub fn options(&self, cancel: &CancellationToken) -> LoadOptions {
        LoadOptions::builder()
            .max_header_length(self.max_header_length)
            .max_decompressed_size(self.max_decompressed_size)
            .maybe_read_timeout(self.timeout_ms.map(Duration::from_millis))
            .cancellation(cancel.clone())
            .build()
    }

    pub async fn load(&self, path: &Path, cancel: &CancellationToken) -> Result<LoadedHeader> {
        let mut f = tokio::fs::File::open(path)
            .await
            .into_diagnostic()
            .context(format!("path: {}", path.display()))?;

        axrp_archive::load_header_with(&mut f, &self.options(cancel))
            .await
            .context(format!("reading header of {}", path.display()))
    }
}
