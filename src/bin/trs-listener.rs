//! trs-listener CLI: decode and replay TRS change-event payloads.
//!
//! Usage:
//!   trs-listener decode <file>
//!   trs-listener replay [--topic T] [--config path] <file>...

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use trs_listener::{
    ChangeEventMessage, EventAssembler, EventHandler, HandlerError, IngestError, Listener,
    ListenerConfig,
};

#[derive(Parser)]
#[command(
    name = "trs-listener",
    version,
    about = "Decode TRS change events from JSON-LD payloads"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode one payload file and print the event and its context graph
    Decode {
        /// Payload file (JSON-LD)
        file: PathBuf,
    },
    /// Feed payload files through a listener as if delivered by a broker
    Replay {
        /// Topic reported for every message
        #[arg(long, default_value = "trs/changes")]
        topic: String,
        /// Listener config file (YAML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Payload files, delivered in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Default config path (~/.config/trs-listener/config.yaml)
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("trs-listener").join("config.yaml"))
}

fn load_config(explicit: Option<PathBuf>) -> Result<ListenerConfig, String> {
    match explicit {
        Some(path) => ListenerConfig::load(&path).map_err(|e| e.to_string()),
        None => match default_config_path() {
            Some(path) if path.exists() => ListenerConfig::load(&path).map_err(|e| e.to_string()),
            _ => Ok(ListenerConfig::default()),
        },
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn read_payload(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))
}

fn cmd_decode(file: &Path) -> i32 {
    let payload = match read_payload(file) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let message = match EventAssembler::new().decode(&payload) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    match serde_json::to_string_pretty(&message) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Prints one JSON line per delivered event
struct PrintingHandler;

#[async_trait]
impl EventHandler for PrintingHandler {
    async fn process_change_event(&self, message: ChangeEventMessage) -> Result<(), HandlerError> {
        let line = serde_json::json!({
            "kind": message.event().kind(),
            "changed": message.event().changed(),
            "order": message.event().order(),
            "context_triples": message.context().len(),
        });
        println!("{}", line);
        Ok(())
    }
}

fn cmd_replay(topic: &str, config: ListenerConfig, files: &[PathBuf]) -> i32 {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {}", e);
            return 1;
        }
    };

    let listener = Listener::with_config(Arc::new(PrintingHandler), rt.handle().clone(), config);

    // This thread plays the transport's delivery thread.
    let mut deliveries = Vec::new();
    let mut rejected = 0usize;
    for file in files {
        let payload = match read_payload(file) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Error: {}", e);
                rejected += 1;
                continue;
            }
        };
        match listener.on_message(topic, &payload) {
            Ok(delivery) => deliveries.push((file, delivery)),
            Err(e) => {
                eprintln!("{}: rejected: {}", file.display(), e);
                rejected += 1;
            }
        }
    }

    let (delivered, dropped) = rt.block_on(async {
        let mut delivered = 0usize;
        let mut dropped = 0usize;
        for (file, delivery) in deliveries {
            match delivery.outcome().await {
                Ok(_) => delivered += 1,
                Err(e) => {
                    report_drop(file, &e);
                    dropped += 1;
                }
            }
        }
        (delivered, dropped)
    });

    eprintln!(
        "{} delivered, {} dropped, {} rejected",
        delivered, dropped, rejected
    );
    if delivered == files.len() {
        0
    } else {
        1
    }
}

fn report_drop(file: &Path, err: &IngestError) {
    eprintln!("{}: dropped: {}", file.display(), err);
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match cli.command {
        Commands::Decode { file } => cmd_decode(&file),
        Commands::Replay { topic, config, files } => match load_config(config) {
            Ok(config) => cmd_replay(&topic, config, &files),
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
    };
    std::process::exit(code);
}
