//! forum_cli: read forum listings and threads as JSON.

mod app;
mod config;
mod effects;
mod logging;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use forum_core::{ExtractMode, RequestKind};
use forum_engine::EngineHandle;

use crate::app::{PageLimit, Reader, Report};
use crate::config::{load_config, DEFAULT_CONFIG_FILE};
use crate::effects::EffectRunner;
use crate::logging::{LogDestination, LOG_FILE};

#[derive(Parser, Debug)]
#[command(name = "forum_cli", version, about = "Read Discuz forum listings and threads as JSON")]
struct Cli {
    /// RON config file [default: forum.ron]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cookie header of a logged-in session
    #[arg(long, env = "FORUM_COOKIE", hide_env_values = true)]
    cookie: Option<String>,

    #[arg(long, value_enum, default_value_t = LogDestination::Terminal)]
    log: LogDestination,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Seconds to wait for any single page
    #[arg(long, default_value_t = 90)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Threads of a forum section
    Listing {
        forum_id: String,
        #[command(flatten)]
        paging: Paging,
    },
    /// Posts of a thread
    Thread {
        thread_id: String,
        #[command(flatten)]
        paging: Paging,
        /// Keep only posts by the thread starter
        #[arg(long)]
        only_author: bool,
        /// First few posts per page, without images
        #[arg(long)]
        quick: bool,
    },
}

#[derive(Args, Debug)]
struct Paging {
    /// Number of pages to read
    #[arg(long, default_value_t = 1)]
    pages: u32,
    /// Read until the last page
    #[arg(long, conflicts_with = "pages")]
    all: bool,
}

impl Paging {
    fn limit(&self) -> PageLimit {
        if self.all {
            PageLimit::All
        } else {
            PageLimit::Pages(self.pages)
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.log, cli.verbose, Path::new(LOG_FILE))?;

    let (config_path, explicit) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    let mut config = load_config(&config_path, explicit)?;
    if cli.cookie.is_some() {
        config.cookie = cli.cookie.clone();
    }
    let settings = config.into_settings()?;
    let quick_limit = settings.extract.quick_limit;

    let engine = EngineHandle::new(settings).context("failed to start the engine")?;
    let reader = Reader::new(EffectRunner::new(engine), Duration::from_secs(cli.timeout));

    let (feed, limit, only_author) = match &cli.command {
        Command::Listing { forum_id, paging } => (
            RequestKind::Listing {
                forum_id: forum_id.clone(),
            },
            paging.limit(),
            false,
        ),
        Command::Thread {
            thread_id,
            paging,
            only_author,
            quick,
        } => {
            let mode = if *quick {
                ExtractMode::Quick { limit: quick_limit }
            } else {
                ExtractMode::Full
            };
            (
                RequestKind::Thread {
                    thread_id: thread_id.clone(),
                    mode,
                },
                paging.limit(),
                *only_author,
            )
        }
    };

    let view = reader.read(feed, limit, only_author)?;
    let json = serde_json::to_string_pretty(&Report::from_view(view))?;
    println!("{json}");
    Ok(())
}
