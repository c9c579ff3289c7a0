use clap::Parser;
use std::process;
use tracing_subscriber::EnvFilter;

use channel_sweep::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "channel_sweep=debug,info"
    } else {
        "channel_sweep=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    let code = cli::execute(cli).await?;
    if code != 0 {
        process::exit(code);
    }
    Ok(())
}
