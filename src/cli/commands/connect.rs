//! Interactive session command handler

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::auth::AzureCliBroker;
use crate::config::DEFAULT_ENV_FILE;
use crate::diagnostics;
use crate::probe::{self, session};

#[derive(Args)]
pub struct ConnectCommand {
    /// Path to the key-value config file
    #[arg(long, default_value = DEFAULT_ENV_FILE, help = "Path to the config file")]
    pub env_file: PathBuf,

    /// Abort connection establishment after this many seconds
    #[arg(long, help = "Connection deadline in seconds")]
    pub timeout: Option<u64>,
}

/// Handle the connect command. Establishes the authenticated session, then
/// hands control to a line-oriented loop until EOF, `exit` or Ctrl-C. The
/// connection is dropped on every exit path.
pub async fn handle_connect_command(args: ConnectCommand) -> Result<i32> {
    let broker = AzureCliBroker::new();
    let deadline = args.timeout.map(Duration::from_secs);

    let mut session = match probe::establish(&broker, &args.env_file, deadline).await {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{}", diagnostics::render_failure(&err));
            return Ok(1);
        }
    };

    println!(
        "{} {} {}",
        "✓".bright_green().bold(),
        "connected to".bright_green(),
        session.target().cyan().bold()
    );
    println!("{}", "Type commands, or `exit` to close the session.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", format!("{}>", session.target()).bright_green());
        std::io::stdout().flush()?;

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{}", "Interrupted, closing session.".dimmed());
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
                    break;
                }
                match session.execute_line(trimmed).await {
                    Ok(value) => println!("{}", session::format_value(&value)),
                    Err(err) => eprintln!("{}", err.to_string().bright_red()),
                }
            }
        }
    }

    Ok(0)
}
