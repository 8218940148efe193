mod cli;

use anyhow::Result;
use bandmeta::logging::init_logging;
use bandmeta::state::Config;
use clap::Parser;
use cli::commands::{self, utils::Context};
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignores if missing)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::resolve(&cli.data_dir)?;
    init_logging(&config.log_filter, cli.verbose);

    match cli.command {
        Commands::Total { lengths } => commands::total::run(&lengths, cli.json)?,
        Commands::Auth => commands::auth::run(&mut Context::new(config)?).await?,
        Commands::Logout => commands::auth::logout(&mut Context::new(config)?).await?,
        Commands::Status => commands::auth::status(&Context::new(config)?, cli.json).await?,
        Commands::Resolve { url } => {
            commands::lookup::resolve(&Context::new(config)?, &url, cli.json).await?
        }
        Commands::Preview { track } => {
            commands::lookup::preview(&Context::new(config)?, &track, cli.json).await?
        }
        Commands::Search { artist, title } => {
            commands::lookup::search(&Context::new(config)?, &artist, &title, cli.json).await?
        }
    }

    Ok(())
}
