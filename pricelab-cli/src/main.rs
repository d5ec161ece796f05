//! PriceLab CLI: download, load and period-file management commands.
//!
//! Commands:
//! - `download`: fetch prices from Yahoo Finance into the monthly CSV store
//! - `load`: load stored prices for tickers and a date range, write CSV
//! - `status`: report period files and the latest stored date per ticker
//! - `clean`: delete all period files

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use pricelab_core::config::ResearchConfig;
use pricelab_core::data::{
    fetch_and_store, plan_downloads, write_price_columns, write_price_csv, LoadFilter,
    LogProgress, PriceLoader, PriceStore, YahooProvider,
};
use pricelab_core::domain::{months_between, select_columns, IntoDate};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pricelab", about = "PriceLab CLI: research price data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command.
#[derive(Args)]
struct Common {
    /// TOML config file. Defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory holding the period files. Overrides the config.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

impl Common {
    fn resolve(&self) -> Result<ResearchConfig> {
        let mut config = match &self.config {
            Some(path) => ResearchConfig::from_file(path)?,
            None => ResearchConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Download prices from Yahoo Finance into the monthly CSV store.
    Download {
        /// Tickers to download. Defaults to the configured universe.
        tickers: Vec<String>,

        /// Start date (YYYY-MM-DD) for tickers with no stored data.
        /// Defaults to the universe start date.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD), inclusive. Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Drop the stored rows of these tickers and download them again.
        #[arg(long, default_value_t = false)]
        force: bool,

        #[command(flatten)]
        common: Common,
    },
    /// Load stored prices and write them as CSV.
    Load {
        /// Tickers to load. Defaults to every stored ticker.
        tickers: Vec<String>,

        /// Start date (YYYY-MM-DD), inclusive. Unbounded when omitted.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD), inclusive. Unbounded when omitted.
        #[arg(long)]
        end: Option<String>,

        /// Output file. Defaults to stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Comma-separated columns to write, in order (e.g. date,ticker,close).
        /// Defaults to every column.
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        #[command(flatten)]
        common: Common,
    },
    /// Report period files and the latest stored date per ticker.
    Status {
        #[command(flatten)]
        common: Common,
    },
    /// Delete all period files.
    Clean {
        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,

        #[command(flatten)]
        common: Common,
    },
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();

    match cli.command {
        Commands::Download {
            tickers,
            start,
            end,
            force,
            common,
        } => run_download(tickers, start, end, force, &common.resolve()?),
        Commands::Load {
            tickers,
            start,
            end,
            output,
            columns,
            common,
        } => run_load(tickers, start, end, output, columns, &common.resolve()?),
        Commands::Status { common } => run_status(&common.resolve()?),
        Commands::Clean { confirm, common } => run_clean(confirm, &common.resolve()?),
    }
}

fn parse_date(value: Option<&str>) -> Result<Option<NaiveDate>> {
    Ok(value.map(|s| s.into_date()).transpose()?)
}

fn run_download(
    tickers: Vec<String>,
    start: Option<String>,
    end: Option<String>,
    force: bool,
    config: &ResearchConfig,
) -> Result<()> {
    let tickers = if tickers.is_empty() {
        config.universe.tickers().to_vec()
    } else {
        tickers
    };
    let start_date = parse_date(start.as_deref())?.unwrap_or(config.universe.start_date);
    let end_date = parse_date(end.as_deref())?.unwrap_or_else(|| chrono::Local::now().date_naive());
    if start_date > end_date {
        bail!("start date {start_date} is after end date {end_date}");
    }

    // Built before planning so a forced run never drops data it cannot replace.
    let provider = YahooProvider::new()?;
    let store = PriceStore::new(&config.data_dir);
    let plan = plan_downloads(&store, &tickers, start_date, end_date, force)?;
    if plan.is_empty() {
        println!("All {} tickers up to date.", tickers.len());
        return Ok(());
    }

    log::info!("{} of {} tickers need data", plan.len(), tickers.len());
    let summary = fetch_and_store(
        &provider,
        &store,
        &plan,
        &config.download.to_options(),
        &LogProgress,
    );

    println!(
        "Stored {} rows for {} tickers under {}",
        summary.rows_stored(),
        summary.stored.len(),
        config.data_dir.display()
    );

    if !summary.all_succeeded() {
        for (ticker, err) in &summary.errors {
            eprintln!("Error for {ticker}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_load(
    tickers: Vec<String>,
    start: Option<String>,
    end: Option<String>,
    output: Option<PathBuf>,
    columns: Vec<String>,
    config: &ResearchConfig,
) -> Result<()> {
    let columns = select_columns(&columns)?;

    let mut filter = LoadFilter::new();
    if !tickers.is_empty() {
        filter = filter.tickers(&tickers);
    }
    if let Some(start) = parse_date(start.as_deref())? {
        filter = filter.start(start);
    }
    if let Some(end) = parse_date(end.as_deref())? {
        filter = filter.end(end);
    }

    let table = PriceLoader::new(&config.data_dir).load_filtered(&filter)?;

    let out: Box<dyn std::io::Write> = match output {
        Some(path) => Box::new(
            std::fs::File::create(&path).with_context(|| format!("create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };
    if columns.is_empty() {
        write_price_csv(&table, out)?;
    } else {
        write_price_columns(&table, &columns, out)?;
    }

    match table.date_span() {
        Some((first, last)) => eprintln!(
            "Loaded {} rows, {} tickers, {first} to {last}",
            table.len(),
            table.tickers().len()
        ),
        None => eprintln!("No rows matched."),
    }
    Ok(())
}

fn run_status(config: &ResearchConfig) -> Result<()> {
    let store = PriceStore::new(&config.data_dir);
    let files = store.period_files()?;

    if files.is_empty() {
        println!("No period files under {}", config.data_dir.display());
        return Ok(());
    }

    println!("Data directory: {}", config.data_dir.display());
    println!("Period files:   {}", files.len());
    if let (Some(first), Some(last)) = (files.first(), store.last_month_with_data()?) {
        let span = months_between(
            NaiveDate::from_ymd_opt(first.year, first.month, 1).unwrap_or(last),
            last,
        );
        let gaps: Vec<String> = span
            .iter()
            .filter(|(y, m)| !files.iter().any(|f| f.year == *y && f.month == *m))
            .map(|(y, m)| format!("{y}-{m:02}"))
            .collect();
        println!(
            "Months:         {}-{:02} to {} ({} missing)",
            first.year,
            first.month,
            last.format("%Y-%m"),
            gaps.len()
        );
        if !gaps.is_empty() {
            println!("Missing:        {}", gaps.join(", "));
        }
    }
    println!();

    let mut last_dates: Vec<(String, NaiveDate)> = store.last_dates()?.into_iter().collect();
    last_dates.sort();

    println!("{:<8} {:<12} {:<10}", "Ticker", "Last date", "Universe");
    println!("{}", "-".repeat(32));
    for (ticker, date) in &last_dates {
        let member = if config.universe.contains(ticker) { "yes" } else { "no" };
        println!("{ticker:<8} {:<12} {member:<10}", date.to_string());
    }
    for ticker in config.universe.tickers() {
        if !last_dates.iter().any(|(t, _)| t == ticker) {
            println!("{ticker:<8} {:<12} {:<10}", "(none)", "yes");
        }
    }

    Ok(())
}

fn run_clean(confirm: bool, config: &ResearchConfig) -> Result<()> {
    let store = PriceStore::new(&config.data_dir);
    let files = store.period_files()?;

    if files.is_empty() {
        println!("No period files under {}", config.data_dir.display());
        return Ok(());
    }

    println!("Found {} period file(s):", files.len());
    for file in &files {
        println!("  {}", file.path.display());
    }

    if !confirm {
        println!();
        println!("Dry run. Pass --confirm to actually delete.");
        return Ok(());
    }

    let removed = store.clean()?;
    println!("Done. Removed {removed} file(s).");
    Ok(())
}
