//! Domain types for PriceLab

pub mod date;
pub mod price;

pub use date::{last_day_of_month, months_between, DateRange, IntoDate, InvalidDate, DATE_FORMAT};
pub use price::{select_columns, PriceRow, PriceTable, Ticker, UnknownColumn, PRICE_COLUMNS};
