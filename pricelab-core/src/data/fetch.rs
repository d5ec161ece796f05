//! Multi-ticker price fetch into a single table.

use super::provider::{PriceProvider, ProviderError};
use crate::domain::{DateRange, PriceRow, PriceTable};
use thiserror::Error;

/// A provider failure, tagged with the ticker being fetched.
#[derive(Debug, Error)]
#[error("fetching {ticker} from {provider} failed: {source}")]
pub struct FetchError {
    pub ticker: String,
    pub provider: String,
    #[source]
    pub source: ProviderError,
}

/// Fetch daily prices for every ticker over the inclusive `range`.
///
/// Tickers the provider does not know contribute no rows. Any other provider
/// error aborts the call and names the ticker at fault.
pub fn fetch_prices<S: AsRef<str>>(
    provider: &dyn PriceProvider,
    tickers: &[S],
    range: DateRange,
) -> Result<PriceTable, FetchError> {
    let mut rows: Vec<PriceRow> = Vec::new();

    for ticker in tickers {
        let ticker = ticker.as_ref();
        match provider.fetch(ticker, range) {
            Ok(fetched) => {
                log::debug!("{ticker}: {} rows from {}", fetched.len(), provider.name());
                rows.extend(
                    fetched
                        .into_iter()
                        .filter(|r| range.contains(r.date))
                        .map(|r| PriceRow {
                            ticker: ticker.to_string(),
                            ..r
                        }),
                );
            }
            Err(ProviderError::SymbolNotFound { .. }) => {
                log::warn!("{ticker}: no data from {}, skipping", provider.name());
            }
            Err(source) => {
                return Err(FetchError {
                    ticker: ticker.to_string(),
                    provider: provider.name().to_string(),
                    source,
                });
            }
        }
    }

    Ok(PriceTable::from_rows(rows))
}
