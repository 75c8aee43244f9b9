//! `qst` binary: schedules configured QST broadcasts and prints each payload
//! with the port it is queued for.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use qst_broadcast::{
    init_logging, schedule_from_config, spawn_scheduler, Capabilities, ProducerContext,
    QstConfig, QstKind, QstSource,
};

#[derive(Parser)]
#[command(name = "qst", version, about = "Periodic QST broadcast generator")]
struct Cli {
    /// Config file (falls back to $QST_CONFIG_PATH, then config/qst.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Schedule every enabled entry and print payloads as they fire (default)
    Run,
    /// List configured entries
    List,
    /// Produce one entry once and print the result
    Fire {
        /// Entry identifier from `[qst.<ident>]`
        ident: String,
    },
    /// Producer kinds available in this build
    Kinds,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let caps = Capabilities::detect();

    match cli.command.unwrap_or(Command::Run) {
        Command::Kinds => {
            for kind in QstKind::available(caps) {
                println!("{kind}");
            }
            Ok(())
        }
        Command::List => {
            let config = QstConfig::load(cli.config.as_deref())?;
            for (ident, entry) in &config.qst {
                let describe = QstKind::from_type_name(&entry.kind)
                    .map(|k| k.describe(&entry.content))
                    .unwrap_or_else(|| format!("unknown type {:?}", entry.kind));
                println!(
                    "{ident}\t{}\t{}\t{}\t{}\t{describe}",
                    entry.kind,
                    entry.freq,
                    entry.port(),
                    if entry.enabled { "on" } else { "off" },
                );
            }
            Ok(())
        }
        Command::Fire { ident } => {
            let config = QstConfig::load(cli.config.as_deref())?;
            let ctx = ProducerContext::from_config(&config)?;
            let entry = config.entry(&ident)?;
            let source = QstSource::from_entry(&ident, entry, caps, &ctx)?;
            match source.produce().await {
                Some(value) => println!("{}{value}", source.prefix()),
                None => println!("no data"),
            }
            Ok(())
        }
        Command::Run => run(cli.config, caps).await,
    }
}

async fn run(config_path: Option<PathBuf>, caps: Capabilities) -> Result<()> {
    let config = QstConfig::load(config_path.as_deref())?;
    let ctx = ProducerContext::from_config(&config)?;

    let scheduled = schedule_from_config(&config, caps, &ctx);
    let ports: HashMap<String, String> = scheduled
        .iter()
        .map(|s| (s.source.key().to_string(), s.port.to_string()))
        .collect();
    tracing::info!(sources = scheduled.len(), "QST scheduler starting");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handles = spawn_scheduler(scheduled, tx);

    loop {
        tokio::select! {
            fired = rx.recv() => {
                let Some(fired) = fired else { break };
                let port = ports.get(&fired.key).map(String::as_str).unwrap_or("all");
                tracing::info!(target: "qst", key = %fired.key, port, chars = fired.text.chars().count(), "QST queued");
                println!("[{port}] {}", fired.text);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    drop(rx);
    for h in handles {
        h.abort();
    }
    Ok(())
}
