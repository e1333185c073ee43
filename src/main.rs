use anyhow::Result;
use clap::Parser;
use log::info;

use redis_doctor::cli::commands::{handle_connect_command, handle_test_command};
use redis_doctor::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env().init();

    let cli = Cli::parse();
    info!("Starting redis-doctor");

    let exit_code = match cli.command {
        Commands::Connect(args) => handle_connect_command(args).await?,
        Commands::TestConnection(args) => handle_test_command(args).await?,
    };

    std::process::exit(exit_code);
}
