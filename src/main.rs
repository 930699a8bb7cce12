use std::fs;
use std::io::Write;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, SharedLogger, TermLogger, TerminalMode, WriteLogger};

use crate::config::{Config, Source, StorageArgs};
use crate::storage::{Backend, Storage};

mod api;
mod config;
mod error;
mod models;
mod runner;
mod storage;

/// Collects bike-sharing station availability and appends it to a store.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Opt {
    /// Logging level
    #[clap(long, default_value = "info")]
    level: LevelFilter,

    /// Also write logs to this file
    #[clap(long)]
    log_file: Option<String>,

    /// Seconds to sleep between two collections. Runs only once when set to 0
    #[clap(short, long, default_value_t = 0)]
    sleep_interval: u64,

    /// Source to poll as `city=url`, may be repeated (defaults to Trento and Rovereto)
    #[clap(long = "source", value_name = "CITY=URL")]
    sources: Vec<Source>,

    /// Print every stored station as JSON and exit
    #[clap(long)]
    list: bool,

    #[clap(flatten)]
    storage: StorageArgs,
}

fn init_logger(level: LevelFilter, log_file: Option<&str>) -> anyhow::Result<()> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context("can't open log file")?;

        loggers.push(WriteLogger::new(level, simplelog::Config::default(), file));
    }

    CombinedLogger::init(loggers).context("init logger")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();

    init_logger(opt.level, opt.log_file.as_deref())?;

    let config = Config::new(opt.sources, opt.sleep_interval, opt.storage)?;
    log::debug!("{:?}", config);

    let storage = Backend::open(&config.storage)
        .await
        .context("open station store")?;

    if opt.list {
        let stations = storage.list().await.context("list stations")?;

        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &stations)?;
        writeln!(stdout)?;

        return Ok(());
    }

    let fetcher = api::HttpFetcher::new()?;
    let runner = runner::CollectionRunner::new(fetcher, storage, config.sources, config.sleep_interval);

    runner
        .run(runner::shutdown_on(tokio::signal::ctrl_c()))
        .await
        .context("collection failed")
}
