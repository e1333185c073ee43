use clap::{Parser, Subcommand};

use super::commands::connect::ConnectCommand;
use super::commands::test::TestConnectionCommand;

#[derive(Parser)]
#[command(name = "redis-doctor")]
#[command(about = "Connectivity doctor for Entra ID authenticated Azure Cache for Redis")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open an interactive session against the cache
    Connect(ConnectCommand),
    /// Run a single liveness probe and report a classified diagnosis
    TestConnection(TestConnectionCommand),
}
