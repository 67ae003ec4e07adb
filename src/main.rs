//! WolfMirror - Filer Cross-Cluster Replication
//!
//! Mirrors filer entries and their chunk data from one cluster into
//! another, one metadata event at a time.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wolfmirror::config::WolfMirrorConfig;
use wolfmirror::error::{Error, Result};
use wolfmirror::filer::{FilerClient, RemoteFilerClient};
use wolfmirror::replication::{
    FilerSource, HttpUploader, ReplicationEvent, Replicator, SinkContext, SinkRegistry,
};
use wolfmirror::storage::{walk_index_path, NeedleMap};

/// WolfMirror - Filer Cross-Cluster Replication
#[derive(Parser)]
#[command(name = "wolfmirror")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "wolfmirror.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "wolfmirror.toml")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,

    /// Check that the source and sink filers answer
    Check,

    /// Walk a volume index file
    ScanIndex {
        /// Path to the .idx file
        file: PathBuf,

        /// Print every record instead of a summary
        #[arg(short, long)]
        verbose: bool,
    },

    /// Replicate one metadata event read from a JSON file
    Apply {
        /// Path to the event JSON
        event: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_logging = WolfMirrorConfig::from_file(&cli.config)
        .map(|config| config.logging)
        .unwrap_or_default();
    let level = cli.log_level.as_deref().unwrap_or(&file_logging.level);
    init_logging(level, &file_logging.format);

    match cli.command {
        Commands::Init { output } => run_init(output),
        Commands::Validate => run_validate(cli.config),
        Commands::Check => run_check(cli.config).await,
        Commands::ScanIndex { file, verbose } => run_scan_index(file, verbose),
        Commands::Apply { event } => run_apply(cli.config, event).await,
    }
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Initialize configuration file
fn run_init(output: PathBuf) -> Result<()> {
    if output.exists() {
        return Err(Error::Config(format!(
            "{} already exists",
            output.display()
        )));
    }

    let content = format!(
        "# WolfMirror Configuration\n# Generated configuration file\n\n{}",
        WolfMirrorConfig::sample().to_toml()?
    );
    std::fs::write(&output, content)?;

    println!("Configuration file created: {}", output.display());
    println!("Edit the filer addresses and directories, then run:");
    println!("  wolfmirror --config {} check", output.display());
    Ok(())
}

/// Validate configuration file
fn run_validate(config_path: PathBuf) -> Result<()> {
    match WolfMirrorConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!(
                "  Source:  {}{}",
                config.source.filer, config.source.directory
            );
            println!(
                "  Sink:    {} {}{}",
                config.sink.kind, config.sink.filer, config.sink.directory
            );
            println!(
                "  Transfers: {}",
                match config.transfer.max_concurrent_transfers {
                    0 => "one per chunk".to_string(),
                    n => format!("at most {} per entry", n),
                }
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}

/// Probe both filers
async fn run_check(config_path: PathBuf) -> Result<()> {
    let config = WolfMirrorConfig::from_file(&config_path)?;
    let pool = SinkContext::pool_for(&config.transfer);

    let mut failed = false;
    for (role, address) in [("source", &config.source.filer), ("sink", &config.sink.filer)] {
        if address.is_empty() {
            continue;
        }
        let client = RemoteFilerClient::new(address.clone(), pool.clone());
        match client.get_filer_configuration().await {
            Ok(resp) => {
                println!("✓ {} filer {}", role, address);
                println!("  Masters:     {}", resp.masters.join(", "));
                println!("  Replication: {}", resp.replication);
                println!("  Collection:  {}", resp.collection);
                println!("  Max chunk:   {} MB", resp.max_mb);
            }
            Err(e) => {
                eprintln!("✗ {} filer {}: {}", role, address, e);
                failed = true;
            }
        }
    }

    pool.close_all().await;
    if failed {
        return Err(Error::Network("filer check failed".into()));
    }
    Ok(())
}

/// Walk an index file
fn run_scan_index(path: PathBuf, verbose: bool) -> Result<()> {
    if verbose {
        let mut count = 0u64;
        walk_index_path(&path, |key, offset, size| {
            println!("{:016x} {:>12} {:>10}", key, offset.to_actual_offset(), size);
            count += 1;
            Ok(())
        })?;
        println!("{} records", count);
        return Ok(());
    }

    let file = File::open(&path)?;
    let map = NeedleMap::load(&file)?;

    println!("Index: {}", path.display());
    println!("  Records:       {}", map.record_count);
    println!("  Live needles:  {}", map.len());
    println!("  Deletions:     {}", map.deletion_count);
    println!("  Live bytes:    {}", map.content_size());
    println!("  Garbage bytes: {}", map.deletion_bytes);
    println!("  Max key:       {:x}", map.max_key);
    Ok(())
}

/// Replicate one event through the configured sink
async fn run_apply(config_path: PathBuf, event_path: PathBuf) -> Result<()> {
    let config = WolfMirrorConfig::from_file(&config_path)?;
    let event: ReplicationEvent = serde_json::from_str(&std::fs::read_to_string(&event_path)?)?;

    let pool = SinkContext::pool_for(&config.transfer);
    let http = reqwest::Client::builder()
        .timeout(config.transfer.upload_timeout())
        .build()?;

    let source_filer = Arc::new(RemoteFilerClient::new(
        config.source.filer.clone(),
        pool.clone(),
    ));
    let source = Arc::new(FilerSource::new(source_filer, http));
    let uploader = Arc::new(HttpUploader::new(config.transfer.upload_timeout())?);

    let ctx = SinkContext::new(pool.clone(), source, uploader, config.transfer.clone());
    let sink = SinkRegistry::with_defaults().build(&config.sink, &ctx)?;
    let replicator = Replicator::new(config.source.directory.clone(), sink);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling replication");
            on_signal.cancel();
        }
    });

    info!("Applying event for {}", event.key);
    let result = replicator.replicate(&cancel, &event).await;
    pool.close_all().await;

    match result {
        Ok(()) => {
            println!("✓ Replicated {}", event.key);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Replicate {} failed: {}", event.key, e);
            if e.is_retryable() {
                eprintln!("  (transient, safe to retry)");
            }
            Err(e)
        }
    }
}
