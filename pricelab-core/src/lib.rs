//! PriceLab Core: price data for research notebooks.
//!
//! This crate contains:
//! - Domain types (price rows and tables, date ranges)
//! - The price provider trait and the Yahoo Finance implementation
//! - `fetch_prices`: multi-ticker fetch into one table
//! - The monthly period-file store and the fetch-and-store downloader
//! - `load_prices`: read period files back, filtered and date-sorted
//! - Universe and TOML configuration

pub mod config;
pub mod data;
pub mod domain;

pub use data::{fetch_prices, load_prices};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: public data types are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::PriceRow>();
        require_sync::<domain::PriceRow>();
        require_send::<domain::PriceTable>();
        require_sync::<domain::PriceTable>();
        require_send::<domain::DateRange>();
        require_sync::<domain::DateRange>();

        require_send::<data::PriceLoader>();
        require_sync::<data::PriceLoader>();
        require_send::<data::PriceStore>();
        require_sync::<data::PriceStore>();
        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();
        require_send::<data::Universe>();
        require_sync::<data::Universe>();

        require_send::<data::LoadError>();
        require_sync::<data::LoadError>();
        require_send::<data::FetchError>();
        require_sync::<data::FetchError>();

        require_send::<config::ResearchConfig>();
        require_sync::<config::ResearchConfig>();
    }
}
