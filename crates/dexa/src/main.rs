use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use clap::Parser;
use dexa::models::UserIdentity;
use dexa::Assistant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dexa", about = "Conversational trading assistant for SUI DEX tokens")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/dexa.toml")]
    config: String,

    /// Platform user id; also keys the conversation history
    #[arg(long)]
    user_id: String,

    #[arg(long, default_value = "")]
    user_name: String,

    #[arg(long, default_value = "")]
    display_name: String,

    /// Send one message and exit. Without it, messages are read line by line from stdin.
    #[arg(short, long)]
    message: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr (respects RUST_LOG); replies go to stdout
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let config = dexa::load_config(&cli.config)?;
    let assistant = Assistant::from_config(&config).context("Failed to start assistant")?;
    info!(model = %assistant.agent().model_name(), config = %cli.config, "Assistant ready");

    let identity = UserIdentity::new(cli.user_id, cli.user_name, cli.display_name);

    if let Some(message) = &cli.message {
        let reply = assistant
            .respond(&identity, message)
            .await
            .context("Failed to save conversation")?;
        println!("{reply}");
        return Ok(());
    }

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        let reply = assistant
            .respond(&identity, message)
            .await
            .context("Failed to save conversation")?;
        writeln!(stdout, "{reply}\n")?;
        stdout.flush()?;
    }

    Ok(())
}
