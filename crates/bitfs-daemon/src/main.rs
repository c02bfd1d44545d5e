//! # bitfsd
//!
//! Reads feed events as JSON lines, one per line:
//!
//! ```text
//! {"mempool": {"tx": {"h": "..."}, "in": [...], "out": [...]}}
//! {"block": {"info": {"height": 1}, "items": [...], "mempool": [...]}}
//! ```
//!
//! and feeds them through the single-consumer ingest queue.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bitfs_config::logging::{init_logging, LogLevel};
use bitfs_config::{log_daemon_error, log_daemon_info, Config};
use bitfs_index::MetaKind;
use bitfs_ingest::queue::{self, FeedEvent};
use bitfs_ingest::{Block, Engine, Pipeline, Resolver, Transaction};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::{mpsc, oneshot};

#[derive(Parser)]
#[command(name = "bitfsd")]
#[command(version, about = "bitfs ingest daemon", long_about = None)]
struct Cli {
    /// Config file (default: ~/.bitfs/config.toml merged with ./bitfs.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Storage root, overrides the config file
    #[arg(long, global = true, env = "BITFS_ROOT")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest feed events (default)
    Run {
        /// Read events from a file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Print the stored path and content type of an id
    Resolve {
        /// Content hash or txid (64 hex)
        id: String,
    },

    /// Show store statistics
    Stats,

    /// Write a default config file
    InitConfig {
        /// Destination (default: ~/.bitfs/config.toml)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// One line of the feed
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FeedLine {
    Mempool(Transaction),
    Block(Block),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let level = config.log.level.parse().unwrap_or(LogLevel::Info);
    init_logging(level);

    match cli.command.unwrap_or(Commands::Run { input: None }) {
        Commands::Run { input } => run(config, input).await,
        Commands::Resolve { id } => resolve(&config, &id),
        Commands::Stats => stats(&config),
        Commands::InitConfig { output, force } => init_config(output, force),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    if let Some(root) = &cli.root {
        config.storage.root = root.clone();
    }
    Ok(config)
}

async fn run(config: Config, input: Option<PathBuf>) -> Result<()> {
    let engine = Engine::open(&config).context("Failed to open storage")?;
    let root = config.storage.root.display().to_string();
    log_daemon_info!("bitfsd starting", root = root.as_str());

    // Consumer first, so producers never see a closed queue
    let (tx, queue) = queue::channel(config.ingest.queue_depth);
    let consumer = tokio::spawn(queue::run_consumer(queue, Pipeline::new(engine)));

    let produced = match input {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            produce(BufReader::new(file), tx).await
        }
        None => produce(BufReader::new(tokio::io::stdin()), tx).await,
    };

    // The sender was moved into `produce`; the consumer drains and exits.
    let consumed = consumer.await.context("Ingest consumer panicked")?;
    produced?;
    match consumed {
        Ok(total) => {
            log_daemon_info!(
                "bitfsd stopped",
                processed = total.processed,
                stored = total.stored,
                assembled = total.assembled,
                written = total.written,
                skipped = total.skipped,
                rejected = total.rejected,
            );
            Ok(())
        }
        Err(e) => bail!("ingest stopped: {e}"),
    }
}

/// Read JSON lines until EOF, Ctrl-C or the consumer stopping, pushing each
/// event onto the queue.
async fn produce<R>(reader: R, tx: mpsc::Sender<FeedEvent>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0u64;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read feed")?,
            _ = signal::ctrl_c() => {
                log_daemon_info!("Shutdown signal received");
                return Ok(());
            }
            // Consumer exited on a fatal error; stop waiting on a quiet feed
            _ = tx.closed() => return Ok(()),
        };
        let Some(line) = line else {
            return Ok(());
        };
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let event = match serde_json::from_str::<FeedLine>(&line) {
            Ok(FeedLine::Mempool(transaction)) => FeedEvent::Mempool(transaction),
            Ok(FeedLine::Block(block)) => {
                let (done_tx, done_rx) = oneshot::channel();
                let height = block.info.as_ref().map(|i| i.height).unwrap_or_default();
                if tx
                    .send(FeedEvent::Block {
                        block,
                        done: Some(done_tx),
                    })
                    .await
                    .is_err()
                {
                    return Ok(());
                }
                // Blocks are a sync point: wait until the whole block is durable.
                match done_rx.await {
                    Ok(report) => log_daemon_info!(
                        "Block committed",
                        height = height,
                        processed = report.processed,
                        stored = report.stored,
                        assembled = report.assembled,
                    ),
                    Err(_) => return Ok(()),
                }
                continue;
            }
            Err(e) => {
                log_daemon_error!(
                    "Unparseable feed line",
                    line = line_no,
                    error = e.to_string().as_str(),
                );
                continue;
            }
        };

        if tx.send(event).await.is_err() {
            // Consumer stopped; its error is reported by the caller
            return Ok(());
        }
    }
}

fn resolve(config: &Config, id: &str) -> Result<()> {
    let engine = Engine::open(config).context("Failed to open storage")?;
    match Resolver::new(&engine).resolve(id)? {
        Some(found) => {
            println!("{}", found.path.display());
            println!("  kind:         {}", found.kind.db_name());
            println!("  size:         {} bytes", found.size);
            println!(
                "  content-type: {}",
                found.content_type.as_deref().unwrap_or("(unknown)")
            );
            Ok(())
        }
        None => bail!("{id}: not found"),
    }
}

fn stats(config: &Config) -> Result<()> {
    let engine = Engine::open(config).context("Failed to open storage")?;
    let layout = engine.layout();
    let cas = engine.store().stats()?;

    println!("bitfs store: {}", layout.root().display());
    println!("  content:     {} files, {} bytes", cas.blob_count, cas.total_bytes);
    println!("  avg size:    {} bytes", cas.avg_blob_size());
    println!("  b aliases:   {}", count_entries(&layout.b_dir())?);
    println!("  bcat files:  {}", count_entries(&layout.bcat_dir())?);
    println!("  chunks:      {}", count_entries(&layout.chunks_dir())?);
    println!("  owners:      {}", count_entries(&layout.bitcom_dir())?);
    for kind in MetaKind::LOOKUP_ORDER {
        println!("  typed {:<5} {}", kind.db_name(), engine.metadata().len(kind)?);
    }
    Ok(())
}

fn count_entries(dir: &Path) -> Result<usize> {
    Ok(fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_name().to_string_lossy().ends_with(".tmp"))
        .count())
}

fn init_config(output: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match output {
        Some(p) => p,
        None => Config::global_config_path().context("No home directory")?,
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, Config::default_toml()?)?;
    println!("Wrote {}", path.display());
    Ok(())
}
