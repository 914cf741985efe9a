use axrp_archive::CompactGroup;
use clap::Args;
use miette::{IntoDiagnostic, Result};
use owo_colors::{OwoColorize, Stream, Style};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use super::LoadArgs;

#[derive(Args)]
pub struct TreeArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Print the decoded header as JSON instead
    #[arg(long, default_value_t = false)]
    json: bool,

    #[command(flatten)]
    load: LoadArgs,
}

fn render(group: &CompactGroup, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for (name, value) in &group.parts {
        let name = name.if_supports_color(Stream::Stdout, |n| n.dimmed());
        out.push_str(&format!("{indent}{name} = {value}\n"));
    }
    for (name, child) in &group.children {
        let name = name.if_supports_color(Stream::Stdout, |n| n.style(Style::new().blue().bold()));
        out.push_str(&format!("{indent}{name}/\n"));
        render(child, depth + 1, out);
    }
}

impl TreeArgs {
    pub async fn handle(&self, cancel: &CancellationToken) -> Result<()> {
        let loaded = self.load.load(&self.file, cancel).await?;

        if self.json {
            let json = serde_json::to_string_pretty(&loaded.header).into_diagnostic()?;
            println!("{json}");
            return Ok(());
        }

        let mut out = String::new();
        render(&loaded.header.root, 0, &mut out);
        print!("{out}");

        Ok(())
    }
}
