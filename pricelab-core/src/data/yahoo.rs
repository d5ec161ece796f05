//! Yahoo Finance price provider.
//!
//! Fetches daily OHLCV rows from Yahoo's v8 chart API and normalizes them to
//! [`PriceRow`]s. One request per call; retry and pacing belong to the caller
//! (see `data::download`).
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::provider::{PriceProvider, ProviderError};
use crate::domain::{DateRange, PriceRow};
use chrono::NaiveTime;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance price provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Provider pointed at another host serving the same chart API.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| ProviderError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build the chart API URL for a ticker and inclusive date range.
    fn chart_url(&self, ticker: &str, range: DateRange) -> String {
        let start_ts = range.start.and_time(NaiveTime::MIN).and_utc().timestamp();
        // period2 is the last second of the end date
        let end_ts = range.end.and_time(NaiveTime::MIN).and_utc().timestamp() + 86_399;
        format!(
            "{}/v8/finance/chart/{ticker}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true",
            self.base_url
        )
    }

    /// Parse the chart API response into rows for `ticker`.
    fn parse_response(ticker: &str, resp: ChartResponse) -> Result<Vec<PriceRow>, ProviderError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    ProviderError::SymbolNotFound {
                        ticker: ticker.to_string(),
                    }
                } else {
                    ProviderError::ResponseFormatChanged(format!(
                        "{}: {}",
                        err.code, err.description
                    ))
                }
            } else {
                ProviderError::ResponseFormatChanged("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ResponseFormatChanged("result array is empty".into()))?;

        // A valid ticker with no trading days in range has no timestamps at all.
        let Some(timestamps) = data.timestamp else {
            return Err(ProviderError::SymbolNotFound {
                ticker: ticker.to_string(),
            });
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut rows = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    ProviderError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();
            let adj_close = adj_closes
                .as_ref()
                .and_then(|v| v.get(i).copied().flatten());

            // Skip days where all OHLCV are None (holidays/non-trading days)
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            rows.push(PriceRow {
                date,
                ticker: ticker.to_string(),
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                volume: volume.unwrap_or(0),
                adj_close,
            });
        }

        if rows.is_empty() {
            return Err(ProviderError::SymbolNotFound {
                ticker: ticker.to_string(),
            });
        }

        Ok(rows)
    }
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, ticker: &str, range: DateRange) -> Result<Vec<PriceRow>, ProviderError> {
        let url = self.chart_url(ticker, range);
        log::debug!("GET {url}");

        let resp = self.client.get(&url).send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                ProviderError::NetworkUnreachable(e.to_string())
            } else {
                ProviderError::Other(format!("request for {ticker} failed: {e}"))
            }
        })?;

        if let Some(err) = status_error(resp.status(), resp.headers(), ticker) {
            return Err(err);
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            ProviderError::ResponseFormatChanged(format!(
                "failed to parse response for {ticker}: {e}"
            ))
        })?;

        Self::parse_response(ticker, chart)
    }
}

/// Error for a non-success HTTP status, or `None` when the body should be parsed.
///
/// Unknown tickers come back as 404 with a chart error body, so 404 falls
/// through to [`YahooProvider::parse_response`].
fn status_error(status: StatusCode, headers: &HeaderMap, ticker: &str) -> Option<ProviderError> {
    if status.is_success() || status == StatusCode::NOT_FOUND {
        return None;
    }

    let err = if status == StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimited {
            retry_after_secs: headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(60),
        }
    } else if status == StatusCode::UNAUTHORIZED {
        ProviderError::AuthenticationRequired("Yahoo Finance requires authentication".into())
    } else {
        ProviderError::Http {
            status: status.as_u16(),
            ticker: ticker.to_string(),
        }
    };
    Some(err)
}
