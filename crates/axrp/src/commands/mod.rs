use tokio_util::sync::CancellationToken;

pub mod header;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Inspect archive headers
    Header {
        #[command(subcommand)]
        command: header::HeaderCommands,
    },
}

impl Commands {
    pub async fn handle(&self, cancel: &CancellationToken) -> miette::Result<()> {
        match self {
            Commands::Header { command } => command.handle(cancel).await,
        }
    }
}
