//! Price provider trait and structured error types.
//!
//! The PriceProvider trait abstracts over market-data sources (Yahoo Finance
//! today) so the fetcher and downloader can be driven by a mock in tests.

use crate::domain::{DateRange, PriceRow};
use thiserror::Error;

/// Structured error types for provider calls.
///
/// These are designed to be displayable in CLI output as-is.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("ticker not found: {ticker}")]
    SymbolNotFound { ticker: String },

    #[error("HTTP {status} for {ticker}")]
    Http { status: u16, ticker: String },

    #[error("provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Yahoo answers throttled requests with empty results, so `SymbolNotFound`
    /// is retried too.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ProviderError::AuthenticationRequired(_) | ProviderError::ResponseFormatChanged(_)
        )
    }
}

/// Trait for market-data providers.
///
/// Implementations fetch one ticker at a time. Batching, merging and storage
/// live above this trait.
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily rows for `ticker` over the inclusive `range`.
    ///
    /// Every returned row carries `ticker` and a normalized calendar date.
    fn fetch(&self, ticker: &str, range: DateRange) -> Result<Vec<PriceRow>, ProviderError>;
}

/// Progress callback for multi-ticker downloads.
pub trait DownloadProgress {
    /// Called when starting to fetch a ticker.
    fn on_start(&self, ticker: &str, index: usize, total: usize);

    /// Called when a ticker finishes; `Ok` carries the number of rows stored.
    fn on_complete(&self, ticker: &str, index: usize, total: usize, result: Result<usize, &str>);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that writes through the `log` facade.
pub struct LogProgress;

impl DownloadProgress for LogProgress {
    fn on_start(&self, ticker: &str, index: usize, total: usize) {
        log::info!("[{}/{}] fetching {ticker}", index + 1, total);
    }

    fn on_complete(&self, ticker: &str, _index: usize, _total: usize, result: Result<usize, &str>) {
        match result {
            Ok(rows) => log::info!("{ticker}: stored {rows} rows"),
            Err(e) => log::warn!("{ticker}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        log::info!("download complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Progress reporter that reports nothing.
pub struct NoProgress;

impl DownloadProgress for NoProgress {
    fn on_start(&self, _ticker: &str, _index: usize, _total: usize) {}

    fn on_complete(
        &self,
        _ticker: &str,
        _index: usize,
        _total: usize,
        _result: Result<usize, &str>,
    ) {
    }

    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}
