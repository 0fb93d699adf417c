mod analyze;
mod auth;
mod cli;
mod combine;
mod config;
mod error;
mod files;
mod github;
mod output;
mod produce;
mod release;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting workhist - GitHub Actions workflow history archiver");
    cli.execute().await?;

    Ok(())
}
