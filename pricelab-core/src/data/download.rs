//! Download orchestrator. Fetches tickers one by one and merges them into
//! the monthly store, with retry, backoff and adaptive pacing.

use super::provider::{DownloadProgress, PriceProvider, ProviderError};
use super::store::{PriceStore, StoreError};
use crate::domain::{DateRange, PriceRow};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;

/// Upper bound for the pause between tickers.
const MAX_TICKER_DELAY: Duration = Duration::from_secs(5);
/// Upper bound for the pause between retries of one ticker.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(10);

/// Pacing and retry settings.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Pause after each successful ticker; grows after failures.
    pub base_delay: Duration,
    /// Attempts per ticker before giving up.
    pub max_retries: u32,
    /// When set, only rows on these dates are kept for the listed tickers.
    pub filter_dates: Option<HashMap<String, HashSet<NaiveDate>>>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(300),
            max_retries: 3,
            filter_dates: None,
        }
    }
}

/// Why a ticker was not stored.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Summary of a batch download operation.
#[derive(Debug, Default)]
pub struct DownloadSummary {
    pub total: usize,
    /// Rows stored per ticker, for tickers that stored anything.
    pub stored: BTreeMap<String, usize>,
    /// Tickers with nothing to store: no trading days in range, or no rows
    /// left after the date filter.
    pub skipped: Vec<String>,
    pub errors: Vec<(String, DownloadError)>,
}

impl DownloadSummary {
    pub fn succeeded(&self) -> usize {
        self.stored.len() + self.skipped.len()
    }

    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn rows_stored(&self) -> usize {
        self.stored.values().sum()
    }
}

/// Fetch each ticker of `plan` over its range and merge the rows into `store`.
///
/// Failures are collected per ticker; the batch always runs to the end.
pub fn fetch_and_store(
    provider: &dyn PriceProvider,
    store: &PriceStore,
    plan: &BTreeMap<String, DateRange>,
    options: &DownloadOptions,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = plan.len();
    let mut summary = DownloadSummary {
        total,
        ..Default::default()
    };
    let mut delay = options.base_delay;

    for (i, (ticker, range)) in plan.iter().enumerate() {
        progress.on_start(ticker, i, total);

        let rows = match fetch_with_retry(provider, ticker, *range, options.max_retries, delay) {
            Ok(rows) => rows,
            Err(ProviderError::SymbolNotFound { .. }) => {
                // Yahoo answers a window with no trading days (weekend, holiday)
                // the same way as an unknown symbol: nothing to store.
                delay = (delay * 2).min(MAX_TICKER_DELAY);
                progress.on_complete(ticker, i, total, Ok(0));
                summary.skipped.push(ticker.clone());
                continue;
            }
            Err(e) => {
                // Nothing came back even after retries; slow down for the next ticker
                delay = (delay * 2).min(MAX_TICKER_DELAY);
                let message = e.to_string();
                progress.on_complete(ticker, i, total, Err(&message));
                summary.errors.push((ticker.clone(), e.into()));
                continue;
            }
        };

        let rows = match options.filter_dates.as_ref().and_then(|f| f.get(ticker)) {
            Some(keep) => rows.into_iter().filter(|r| keep.contains(&r.date)).collect(),
            None => rows,
        };

        if rows.is_empty() {
            progress.on_complete(ticker, i, total, Ok(0));
            summary.skipped.push(ticker.clone());
            continue;
        }

        let count = rows.len();
        if let Err(e) = store.merge_rows(rows) {
            let message = e.to_string();
            progress.on_complete(ticker, i, total, Err(&message));
            summary.errors.push((ticker.clone(), e.into()));
            continue;
        }

        progress.on_complete(ticker, i, total, Ok(count));
        summary.stored.insert(ticker.clone(), count);

        // Successful call: decay delay back toward base
        delay = options.base_delay.max(delay.mul_f64(0.8));
        pause(delay);
    }

    progress.on_batch_complete(summary.succeeded(), summary.failed(), total);
    summary
}

/// One ticker with up to `max_retries` attempts and exponential backoff.
fn fetch_with_retry(
    provider: &dyn PriceProvider,
    ticker: &str,
    range: DateRange,
    max_retries: u32,
    initial_backoff: Duration,
) -> Result<Vec<PriceRow>, ProviderError> {
    let attempts = max_retries.max(1);
    let mut backoff = initial_backoff;

    let mut attempt = 1;
    loop {
        match provider.fetch(ticker, range) {
            Ok(rows) => return Ok(rows),
            Err(e) if attempt < attempts && e.is_retryable() => {
                log::warn!("{ticker}: attempt {attempt}/{attempts} failed: {e}");
                pause(backoff);
                backoff = (backoff * 2).min(MAX_RETRY_BACKOFF);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn pause(d: Duration) {
    if !d.is_zero() {
        std::thread::sleep(d);
    }
}

/// Per-ticker ranges for a download run ending at `end`.
///
/// With `force`, the stored rows of `tickers` are removed first (other tickers
/// are untouched) and every ticker starts at `default_start`. Otherwise each
/// ticker resumes the day after its latest stored date; tickers already stored
/// through `end` are left out.
pub fn plan_downloads<S: AsRef<str>>(
    store: &PriceStore,
    tickers: &[S],
    default_start: NaiveDate,
    end: NaiveDate,
    force: bool,
) -> Result<BTreeMap<String, DateRange>, StoreError> {
    let last_dates = if force {
        let removed = store.remove_tickers(tickers)?;
        if removed > 0 {
            log::info!("removed {removed} stored rows for {} tickers", tickers.len());
        }
        HashMap::new()
    } else {
        store.last_dates()?
    };

    let mut plan = BTreeMap::new();
    for ticker in tickers {
        let ticker = ticker.as_ref();
        let start = match last_dates.get(ticker).and_then(|d| d.succ_opt()) {
            Some(next) => next.max(default_start),
            None => default_start,
        };
        if start > end {
            log::debug!("{ticker}: up to date");
            continue;
        }
        plan.insert(ticker.to_string(), DateRange::new(start, end));
    }
    Ok(plan)
}
