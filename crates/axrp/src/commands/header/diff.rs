use axrp_archive::{CompactGroup, LoadedHeader};
use clap::{Args, ValueEnum};
use itertools::Itertools;
use miette::Result;
use owo_colors::{OwoColorize, Stream};
use std::{fmt::Display, path::PathBuf};
use tokio_util::sync::CancellationToken;

use super::LoadArgs;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum Mode {
    /// Only report groups and parts that were added or removed
    Structure,
    /// Also report parts whose offsets differ
    #[default]
    Full,
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Change {
    Added(String),
    Removed(String),
    Comparison(String, String, String),
}

impl Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Change::Added(path) => {
                let path = path.if_supports_color(Stream::Stdout, |p| p.green());
                write!(f, "✅ {path}")
            }
            Change::Removed(path) => {
                let path = path.if_supports_color(Stream::Stdout, |p| p.red());
                write!(f, "❌ {path}")
            }
            Change::Comparison(key, old, new) => {
                let old = old.if_supports_color(Stream::Stdout, |v| v.red());
                let new = new.if_supports_color(Stream::Stdout, |v| v.green());
                write!(f, "🔃 {key}: {old} vs {new}")
            }
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}/{name}")
    }
}

fn diff_groups(
    mode: Mode,
    prefix: &str,
    left: &CompactGroup,
    right: &CompactGroup,
    changes: &mut Vec<Change>,
) {
    for name in left.parts.keys().chain(right.parts.keys()).unique() {
        let path = join(prefix, name);
        match (left.part(name), right.part(name)) {
            (Some(_), None) => changes.push(Change::Removed(path)),
            (None, Some(_)) => changes.push(Change::Added(path)),
            (Some(old), Some(new)) if old != new && mode == Mode::Full => {
                changes.push(Change::Comparison(path, old.to_string(), new.to_string()))
            }
            _ => {}
        }
    }

    for name in left.children.keys().chain(right.children.keys()).unique() {
        let path = join(prefix, name);
        match (left.child(name), right.child(name)) {
            (Some(_), None) => changes.push(Change::Removed(format!("{path}/"))),
            (None, Some(_)) => changes.push(Change::Added(format!("{path}/"))),
            (Some(old), Some(new)) => diff_groups(mode, &path, old, new, changes),
            (None, None) => {}
        }
    }
}

fn diff_headers(mode: Mode, left: &LoadedHeader, right: &LoadedHeader) -> Vec<Change> {
    let mut changes = Vec::new();

    if mode == Mode::Full && left.header_length != right.header_length {
        changes.push(Change::Comparison(
            "header length".into(),
            left.header_length.to_string(),
            right.header_length.to_string(),
        ));
    }

    if left.shape != right.shape {
        changes.push(Change::Comparison(
            "encoding".into(),
            left.shape.to_string(),
            right.shape.to_string(),
        ));
    }

    diff_groups(mode, "", &left.header.root, &right.header.root, &mut changes);
    changes
}

#[derive(Args)]
pub struct DiffArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    left: PathBuf,

    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    right: PathBuf,

    /// Comparison mode
    #[arg(short, long, value_enum, default_value_t = Mode::Full)]
    mode: Mode,

    #[command(flatten)]
    load: LoadArgs,
}

impl DiffArgs {
    pub async fn handle(&self, cancel: &CancellationToken) -> Result<()> {
        let left = self.load.load(&self.left, cancel).await?;
        let right = self.load.load(&self.right, cancel).await?;

        let changes = diff_headers(self.mode, &left, &right);
        if !changes.is_empty() {
            println!("{}", changes.iter().join("\n"));
        }

        Ok(())
    }
}
