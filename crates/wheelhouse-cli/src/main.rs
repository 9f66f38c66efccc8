//! wheelhouse CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wheelhouse_cli::cmd;
use wheelhouse_cli::cmd::fetch::FetchParams;
use wheelhouse_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let quiet = cli.quiet;

    match cli.command {
        Commands::Fetch {
            package,
            python,
            platform,
            output,
            concurrency,
            no_deps,
            index_url,
        } => {
            let params = FetchParams {
                python,
                platform,
                output,
                concurrency,
                no_deps,
                index_url,
            };
            cmd::fetch::fetch(&package, params, quiet).await
        }
        Commands::Info { package, index_url } => cmd::info::info(&package, index_url).await,
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}
