//! Price data: providers, fetching, the monthly CSV store and loading

pub mod download;
pub mod fetch;
pub mod loader;
pub mod provider;
pub mod store;
pub mod universe;
pub mod yahoo;

pub use download::{
    fetch_and_store, plan_downloads, DownloadError, DownloadOptions, DownloadSummary,
};
pub use fetch::{fetch_prices, FetchError};
pub use loader::{load_prices, read_price_csv, LoadError, LoadFilter, PriceLoader};
pub use provider::{DownloadProgress, LogProgress, NoProgress, PriceProvider, ProviderError};
pub use store::{write_price_columns, write_price_csv, PeriodFile, PriceStore, StoreError};
pub use universe::{Universe, UniverseError};
pub use yahoo::YahooProvider;
