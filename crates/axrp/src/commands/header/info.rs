use clap::Args;
use miette::Result;
use owo_colors::{OwoColorize, Stream};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use super::LoadArgs;

#[derive(Args)]
pub struct InfoArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    #[command(flatten)]
    load: LoadArgs,
}

impl InfoArgs {
    pub async fn handle(&self, cancel: &CancellationToken) -> Result<()> {
        let loaded = self.load.load(&self.file, cancel).await?;
        let root = &loaded.header.root;

        println!(
            "{}",
            self.file
                .display()
                .if_supports_color(Stream::Stdout, |p| p.bold())
        );
        println!("  header length:  {} bytes", loaded.header_length);
        println!("  content offset: {}", loaded.content_offset());
        println!("  encoding:       {}", loaded.shape);
        println!("  groups:         {}", root.group_count());
        println!("  parts:          {}", root.part_count());

        Ok(())
    }
}
