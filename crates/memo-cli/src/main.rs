//! memo - inspect and prune a memoization store
//!
//! Reads the same `MEMO_*` environment variables as the library, so it
//! operates on whatever store a program would use from this directory.

mod error;

use crate::error::{CliError, Result};
use clap::{Parser, Subcommand};
use memo_key::CacheKey;
use memo_store::{EntryStore, Settings};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "memo", version, about = "Inspect and prune a memoization store")]
struct Cli {
    #[arg(long, global = true)]
    /// Use <ROOT>/cache and <ROOT>/stash.db instead of the configured locations.
    root: Option<PathBuf>,

    #[arg(long, global = true)]
    /// Print JSON instead of a table.
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stored entries, oldest first.
    List {
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Show per-name totals.
    Stats,
    /// Delete all entries, or those of one name.
    Clear {
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Delete one entry by hash.
    Delete { hash: String },
}

fn main() -> Result<()> {
    let env_filter = EnvFilter::from_default_env().add_directive("memo_cli=info".parse()?);

    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .init();
    };

    let cli = Cli::parse();
    let settings = match &cli.root {
        Some(root) => Settings {
            eviction_policy: Settings::from_env().eviction_policy,
            ..Settings::with_root(root)
        },
        None => Settings::from_env(),
    };
    info!(store = ?settings.store_location, cache = ?settings.cache_location, "Opening store");

    let store = EntryStore::open(&settings)?;
    let stdout = io::stdout();
    run(&store, &cli.command, cli.json, &mut stdout.lock())
}

fn run(store: &EntryStore, command: &Command, json: bool, out: &mut impl Write) -> Result<()> {
    match command {
        Command::List { name } => {
            let entries = store.entries(name.as_deref())?;
            if json {
                serde_json::to_writer_pretty(&mut *out, &entries)?;
                writeln!(out)?;
            } else {
                for e in &entries {
                    writeln!(
                        out,
                        "{}  {:<24} {:>10}B  hits={:<6} took={:.3}s  created={}",
                        e.hash,
                        e.name,
                        e.size,
                        e.use_count,
                        e.time_s,
                        e.created_at.format("%Y-%m-%d %H:%M:%S")
                    )?;
                }
            }
        }
        Command::Stats => {
            let stats = store.stats()?;
            if json {
                serde_json::to_writer_pretty(&mut *out, &stats)?;
                writeln!(out)?;
            } else {
                for s in &stats {
                    writeln!(
                        out,
                        "{:<24} entries={:<6} size={:>10}B  hits={:<6} saved={:.3}s",
                        s.name, s.entries, s.total_size, s.hits, s.seconds_saved
                    )?;
                }
            }
        }
        Command::Clear { name } => {
            let removed = store.clear(name.as_deref())?;
            writeln!(out, "Removed {} entries", removed)?;
        }
        Command::Delete { hash } => {
            let key: CacheKey = hash.parse()?;
            if !store.remove(&key)? {
                return Err(CliError::NotFound(hash.clone()));
            }
            writeln!(out, "Removed {}", key)?;
        }
    }
    Ok(())
}
