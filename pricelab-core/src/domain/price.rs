//! PriceRow and PriceTable, the unit of price data and its collection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;

/// Ticker identifier, e.g. "AAPL".
pub type Ticker = String;

/// Column order of every period file and of exported tables.
pub const PRICE_COLUMNS: [&str; 8] = [
    "date", "ticker", "open", "high", "low", "close", "volume", "adj_close",
];

#[derive(Debug, Error)]
#[error("unknown price column '{0}'")]
pub struct UnknownColumn(pub String);

/// Resolve column names (case-insensitive) to their canonical form, keeping
/// the requested order.
pub fn select_columns<S: AsRef<str>>(names: &[S]) -> Result<Vec<&'static str>, UnknownColumn> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref().trim();
            PRICE_COLUMNS
                .iter()
                .copied()
                .find(|c| c.eq_ignore_ascii_case(name))
                .ok_or_else(|| UnknownColumn(name.to_string()))
        })
        .collect()
}

/// One daily observation for one ticker.
///
/// Field order matches [`PRICE_COLUMNS`] so rows serialize straight to CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub ticker: Ticker,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: Option<f64>,
}

impl PriceRow {
    /// Sort and de-duplication key.
    pub fn key(&self) -> (NaiveDate, &str) {
        (self.date, self.ticker.as_str())
    }

    /// CSV text of one column; `None` if `column` is not a price column.
    pub fn field(&self, column: &str) -> Option<String> {
        let text = match column {
            "date" => self.date.to_string(),
            "ticker" => self.ticker.clone(),
            "open" => self.open.to_string(),
            "high" => self.high.to_string(),
            "low" => self.low.to_string(),
            "close" => self.close.to_string(),
            "volume" => self.volume.to_string(),
            "adj_close" => self.adj_close.map(|v| v.to_string()).unwrap_or_default(),
            _ => return None,
        };
        Some(text)
    }
}

/// Price rows ordered by `(date, ticker)` with at most one row per key.
///
/// Tables are built once and not mutated; every fetch or load produces a
/// fresh one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceTable {
    rows: Vec<PriceRow>,
}

impl PriceTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sort rows by `(date, ticker)` and drop repeated keys, keeping the
    /// first occurrence in input order.
    pub fn from_rows(rows: Vec<PriceRow>) -> Self {
        let mut seen: HashSet<(NaiveDate, Ticker)> = HashSet::with_capacity(rows.len());
        let mut rows: Vec<PriceRow> = rows
            .into_iter()
            .filter(|r| seen.insert((r.date, r.ticker.clone())))
            .collect();
        // Stable sort: the dedupe above already fixed which duplicate survives.
        rows.sort_by(|a, b| a.key().cmp(&b.key()));
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[PriceRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PriceRow> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<PriceRow> {
        self.rows
    }

    /// Distinct tickers present, sorted.
    pub fn tickers(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.rows.iter().map(|r| r.ticker.as_str()).collect();
        set.into_iter().collect()
    }

    /// First and last date in the table.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.rows.first()?.date, self.rows.last()?.date))
    }

    /// Wide close panel: date → ticker → close.
    pub fn closes_by_date(&self) -> BTreeMap<NaiveDate, BTreeMap<&str, f64>> {
        let mut panel: BTreeMap<NaiveDate, BTreeMap<&str, f64>> = BTreeMap::new();
        for row in &self.rows {
            panel
                .entry(row.date)
                .or_default()
                .insert(row.ticker.as_str(), row.close);
        }
        panel
    }
}

impl<'a> IntoIterator for &'a PriceTable {
    type Item = &'a PriceRow;
    type IntoIter = std::slice::Iter<'a, PriceRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(ticker: &str, date: &str, close: f64) -> PriceRow {
        PriceRow {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            ticker: ticker.into(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1_000,
            adj_close: Some(close),
        }
    }

    #[test]
    fn from_rows_sorts_by_date_then_ticker() {
        let table = PriceTable::from_rows(vec![
            row("MSFT", "2020-01-03", 3.0),
            row("MSFT", "2020-01-02", 2.0),
            row("AAPL", "2020-01-02", 1.0),
        ]);
        let keys: Vec<_> = table.iter().map(|r| (r.date.to_string(), r.ticker.clone())).collect();
        assert_eq!(
            keys,
            vec![
                ("2020-01-02".to_string(), "AAPL".to_string()),
                ("2020-01-02".to_string(), "MSFT".to_string()),
                ("2020-01-03".to_string(), "MSFT".to_string()),
            ]
        );
    }

    #[test]
    fn from_rows_keeps_first_duplicate() {
        let table = PriceTable::from_rows(vec![
            row("AAPL", "2020-01-02", 10.0),
            row("AAPL", "2020-01-02", 99.0),
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].close, 10.0);
    }

    #[test]
    fn tickers_and_span() {
        let table = PriceTable::from_rows(vec![
            row("MSFT", "2020-01-03", 3.0),
            row("AAPL", "2020-01-02", 1.0),
        ]);
        assert_eq!(table.tickers(), vec!["AAPL", "MSFT"]);
        let (first, last) = table.date_span().unwrap();
        assert_eq!(first.to_string(), "2020-01-02");
        assert_eq!(last.to_string(), "2020-01-03");
        assert!(PriceTable::empty().date_span().is_none());
    }

    #[test]
    fn close_panel_is_keyed_by_date() {
        let table = PriceTable::from_rows(vec![
            row("AAPL", "2020-01-02", 1.0),
            row("MSFT", "2020-01-02", 2.0),
            row("AAPL", "2020-01-03", 3.0),
        ]);
        let panel = table.closes_by_date();
        assert_eq!(panel.len(), 2);
        let first = panel.values().next().unwrap();
        assert_eq!(first["AAPL"], 1.0);
        assert_eq!(first["MSFT"], 2.0);
        assert!(!panel.values().nth(1).unwrap().contains_key("MSFT"));
    }

    #[test]
    fn columns_resolve_case_insensitively_in_order() {
        assert_eq!(
            select_columns(&["Close", " date", "ADJ_CLOSE"]).unwrap(),
            vec!["close", "date", "adj_close"]
        );
        let err = select_columns(&["date", "vwap"]).unwrap_err();
        assert_eq!(err.0, "vwap");
        assert_eq!(err.to_string(), "unknown price column 'vwap'");
    }

    #[test]
    fn field_text_per_column() {
        let mut r = row("AAPL", "2020-01-02", 75.5);
        assert_eq!(r.field("date").as_deref(), Some("2020-01-02"));
        assert_eq!(r.field("close").as_deref(), Some("75.5"));
        assert_eq!(r.field("volume").as_deref(), Some("1000"));
        r.adj_close = None;
        assert_eq!(r.field("adj_close").as_deref(), Some(""));
        assert_eq!(r.field("vwap"), None);
    }

    #[test]
    fn row_serialization_roundtrip() {
        let r = row("AAPL", "2020-01-02", 75.0);
        let json = serde_json::to_string(&r).unwrap();
        let back: PriceRow = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
