//! Integration tests for loading period files from a data directory.

use chrono::NaiveDate;
use pricelab_core::data::{load_prices, LoadError, LoadFilter, PriceLoader, PriceStore};
use pricelab_core::domain::PriceRow;
use std::fs;
use std::path::Path;

const HEADER: &str = "date,ticker,open,high,low,close,volume,adj_close";

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn write_period(root: &Path, year: i32, month: u32, body: &str) -> std::path::PathBuf {
    let dir = root.join(year.to_string());
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("PRICES_{year}-M{month:02}.csv"));
    fs::write(&path, format!("{HEADER}\n{body}")).unwrap();
    path
}

/// One January file: AAPL on the 2nd and 3rd, MSFT on the 2nd.
fn january_fixture(root: &Path) {
    write_period(
        root,
        2020,
        1,
        "2020-01-03,AAPL,74.29,75.14,74.13,74.36,146322800,73.16\n\
         2020-01-02,MSFT,158.78,160.73,158.33,160.62,22622100,156.59\n\
         2020-01-02,AAPL,74.06,75.15,73.80,75.09,135480400,73.88\n",
    );
}

#[test]
fn loads_only_requested_ticker_sorted_by_date() {
    let dir = tempfile::tempdir().unwrap();
    january_fixture(dir.path());

    let table = load_prices(dir.path(), &["AAPL"], "2020-01-01", "2020-01-03").unwrap();

    assert_eq!(table.len(), 2);
    assert!(table.iter().all(|r| r.ticker == "AAPL"));
    assert_eq!(table.rows()[0].date, d("2020-01-02"));
    assert_eq!(table.rows()[0].close, 75.09);
    assert_eq!(table.rows()[1].date, d("2020-01-03"));
    assert_eq!(table.rows()[1].close, 74.36);
}

#[test]
fn unknown_ticker_returns_empty_table() {
    let dir = tempfile::tempdir().unwrap();
    january_fixture(dir.path());

    let table = load_prices(dir.path(), &["NVDA"], "2020-01-01", "2020-12-31").unwrap();
    assert!(table.is_empty());
}

#[test]
fn non_numeric_close_names_file_and_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_period(
        dir.path(),
        2020,
        1,
        "2020-01-02,AAPL,74.06,75.15,73.80,n/a,135480400,73.88\n",
    );

    let err = load_prices(dir.path(), &["AAPL"], "2020-01-01", "2020-01-31").unwrap_err();
    match &err {
        LoadError::Parse {
            path: bad,
            line,
            column,
            value,
        } => {
            assert_eq!(bad, &path);
            assert_eq!(*line, 2);
            assert_eq!(column, "close");
            assert_eq!(value, "n/a");
        }
        other => panic!("expected Parse error, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("PRICES_2020-M01.csv"));
    assert!(message.contains("close"));
}

#[test]
fn end_bound_is_inclusive_and_start_bound_excludes_earlier_days() {
    let dir = tempfile::tempdir().unwrap();
    january_fixture(dir.path());

    let table = load_prices(dir.path(), &["AAPL", "MSFT"], "2020-01-03", "2020-01-03").unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.rows()[0].ticker, "AAPL");
}

#[test]
fn concatenates_months_in_date_order() {
    let dir = tempfile::tempdir().unwrap();
    write_period(dir.path(), 2020, 2, "2020-02-03,AAPL,1,1,1,2,10,\n");
    write_period(dir.path(), 2019, 12, "2019-12-31,AAPL,1,1,1,0.5,10,\n");
    january_fixture(dir.path());

    let table = load_prices(dir.path(), &["AAPL"], "2019-12-01", "2020-02-29").unwrap();
    let dates: Vec<String> = table.iter().map(|r| r.date.to_string()).collect();
    assert_eq!(
        dates,
        ["2019-12-31", "2020-01-02", "2020-01-03", "2020-02-03"]
    );
}

#[test]
fn months_outside_range_are_not_read() {
    let dir = tempfile::tempdir().unwrap();
    january_fixture(dir.path());
    // A corrupt file for a month outside the range must not be touched.
    write_period(dir.path(), 2021, 6, "garbage,AAPL,x,x,x,x,x,x\n");

    let table = load_prices(dir.path(), &["AAPL"], "2020-01-01", "2020-01-31").unwrap();
    assert_eq!(table.len(), 2);

    let err = load_prices(dir.path(), &["AAPL"], "2020-01-01", "2021-12-31").unwrap_err();
    assert!(matches!(err, LoadError::Parse { .. }));
}

#[test]
fn missing_data_dir_is_file_access_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");

    let err = load_prices(&missing, &["AAPL"], "2020-01-01", "2020-01-31").unwrap_err();
    match err {
        LoadError::FileAccess { path, .. } => assert_eq!(path, missing),
        other => panic!("expected FileAccess, got {other:?}"),
    }
}

#[test]
fn invalid_utf8_file_is_file_access_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_period(dir.path(), 2020, 1, "");
    fs::write(&path, b"date,ticker,open,high,low,close,volume\n\xff\xfe,AAPL,1,1,1,1,1\n").unwrap();

    let err = load_prices(dir.path(), &["AAPL"], "2020-01-01", "2020-01-31").unwrap_err();
    assert!(matches!(err, LoadError::FileAccess { .. }));
    assert_eq!(err.path(), Some(path.as_path()));
}

#[test]
fn malformed_date_bound_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    january_fixture(dir.path());

    let err = load_prices(dir.path(), &["AAPL"], "01/01/2020", "2020-01-31").unwrap_err();
    assert!(matches!(err, LoadError::InvalidDate(_)));
}

#[test]
fn inverted_range_returns_empty_table() {
    let dir = tempfile::tempdir().unwrap();
    january_fixture(dir.path());

    let table = load_prices(dir.path(), &["AAPL"], "2020-01-31", "2020-01-01").unwrap();
    assert!(table.is_empty());
}

#[test]
fn open_filter_loads_everything() {
    let dir = tempfile::tempdir().unwrap();
    january_fixture(dir.path());

    let loader = PriceLoader::new(dir.path());
    let table = loader.load_filtered(&LoadFilter::new()).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.tickers(), vec!["AAPL", "MSFT"]);

    let from_third = loader
        .load_filtered(&LoadFilter::new().start(d("2020-01-03")))
        .unwrap();
    assert_eq!(from_third.len(), 1);
}

#[test]
fn duplicate_rows_across_files_are_collapsed() {
    let dir = tempfile::tempdir().unwrap();
    january_fixture(dir.path());
    // A stray copy at the root repeats one row.
    fs::write(
        dir.path().join("PRICES_2020-M01.csv"),
        format!("{HEADER}\n2020-01-02,AAPL,74.06,75.15,73.80,75.09,135480400,73.88\n"),
    )
    .unwrap();

    let table = load_prices(dir.path(), &["AAPL"], "2020-01-01", "2020-01-31").unwrap();
    assert_eq!(table.len(), 2);
}

#[test]
fn stored_rows_round_trip_through_loader() {
    let dir = tempfile::tempdir().unwrap();
    let store = PriceStore::new(dir.path());

    let rows: Vec<PriceRow> = [
        ("AAPL", "2020-01-30", 81.08),
        ("AAPL", "2020-02-03", 77.17),
        ("MSFT", "2020-01-31", 170.23),
    ]
    .into_iter()
    .map(|(ticker, date, close)| PriceRow {
        date: d(date),
        ticker: ticker.into(),
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1_000_000,
        adj_close: None,
    })
    .collect();

    store.merge_rows(rows.clone()).unwrap();
    let table = load_prices(dir.path(), &["AAPL", "MSFT"], "2020-01-01", "2020-02-29").unwrap();

    let mut expected: Vec<(String, NaiveDate, f64)> =
        rows.iter().map(|r| (r.ticker.clone(), r.date, r.close)).collect();
    expected.sort_by(|a, b| (a.1, &a.0).cmp(&(b.1, &b.0)));
    let loaded: Vec<(String, NaiveDate, f64)> =
        table.iter().map(|r| (r.ticker.clone(), r.date, r.close)).collect();
    assert_eq!(loaded, expected);
}
