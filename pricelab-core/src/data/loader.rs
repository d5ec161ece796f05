//! Period-file loader: reads saved price CSVs back into one table.
//!
//! Every period file under the data directory whose month overlaps the
//! requested range is parsed; rows are filtered by ticker set and inclusive
//! date range, then concatenated and sorted by date.
//!
//! Errors are never swallowed: an unreadable file names its path, a bad field
//! names file, line and column.

use super::store::{discover_period_files, PeriodFile};
use crate::domain::{DateRange, IntoDate, InvalidDate, PriceRow, PriceTable};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from loading period files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A field that does not parse, or (with an empty `value`) a required
    /// column missing from the header on line 1.
    #[error("{}: line {line}, column '{column}': cannot parse {value:?}", path.display())]
    Parse {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
    },

    #[error(transparent)]
    InvalidDate(#[from] InvalidDate),
}

impl LoadError {
    pub(crate) fn io(path: &Path, err: io::Error) -> Self {
        LoadError::FileAccess {
            path: path.to_path_buf(),
            source: csv::Error::from(err),
        }
    }

    /// Path of the file at fault, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            LoadError::FileAccess { path, .. }
            | LoadError::Parse { path, .. } => Some(path),
            LoadError::InvalidDate(_) => None,
        }
    }
}

/// Row filter for [`PriceLoader::load_filtered`].
///
/// `None` means "no constraint": all tickers, or an open-ended bound.
#[derive(Debug, Clone, Default)]
pub struct LoadFilter {
    pub tickers: Option<HashSet<String>>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl LoadFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tickers<S: AsRef<str>>(mut self, tickers: &[S]) -> Self {
        self.tickers = Some(tickers.iter().map(|t| t.as_ref().to_string()).collect());
        self
    }

    pub fn start(mut self, start: NaiveDate) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: NaiveDate) -> Self {
        self.end = Some(end);
        self
    }

    pub fn range(self, range: DateRange) -> Self {
        self.start(range.start).end(range.end)
    }

    /// Effective inclusive range, open bounds widened to the calendar limits.
    pub fn date_range(&self) -> DateRange {
        DateRange::new(
            self.start.unwrap_or(NaiveDate::MIN),
            self.end.unwrap_or(NaiveDate::MAX),
        )
    }

    pub fn matches(&self, row: &PriceRow) -> bool {
        self.date_range().contains(row.date)
            && self
                .tickers
                .as_ref()
                .map_or(true, |set| set.contains(&row.ticker))
    }
}

/// Loads price tables from a directory of period files.
#[derive(Debug, Clone)]
pub struct PriceLoader {
    data_dir: PathBuf,
}

impl PriceLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load rows for `tickers` with `start <= date <= end`.
    ///
    /// Bounds are `NaiveDate`s or `YYYY-MM-DD` strings. Tickers not present
    /// on disk are simply absent from the result.
    pub fn load<S: AsRef<str>>(
        &self,
        tickers: &[S],
        start: impl IntoDate,
        end: impl IntoDate,
    ) -> Result<PriceTable, LoadError> {
        let range = DateRange::parse(start, end)?;
        self.load_filtered(&LoadFilter::new().tickers(tickers).range(range))
    }

    /// Load every row matching `filter`.
    pub fn load_filtered(&self, filter: &LoadFilter) -> Result<PriceTable, LoadError> {
        if !self.data_dir.is_dir() {
            return Err(LoadError::io(
                &self.data_dir,
                io::Error::new(io::ErrorKind::NotFound, "data directory not found"),
            ));
        }

        let range = filter.date_range();
        if range.is_inverted() {
            return Ok(PriceTable::empty());
        }

        let files: Vec<PeriodFile> = discover_period_files(&self.data_dir)?
            .into_iter()
            .filter(|f| range.overlaps_month(f.year, f.month))
            .collect();

        let mut rows = Vec::new();
        for file in &files {
            let parsed = read_price_csv(&file.path)?;
            let before = rows.len();
            rows.extend(parsed.into_iter().filter(|r| filter.matches(r)));
            log::debug!(
                "{}: kept {} rows",
                file.path.display(),
                rows.len() - before
            );
        }

        let table = PriceTable::from_rows(rows);
        log::debug!(
            "loaded {} rows from {} period files under {}",
            table.len(),
            files.len(),
            self.data_dir.display()
        );
        Ok(table)
    }
}

/// Load rows for `tickers` over `[start, end]` from the period files under `data_dir`.
pub fn load_prices<S: AsRef<str>>(
    data_dir: impl AsRef<Path>,
    tickers: &[S],
    start: impl IntoDate,
    end: impl IntoDate,
) -> Result<PriceTable, LoadError> {
    PriceLoader::new(data_dir.as_ref()).load(tickers, start, end)
}

// ── CSV parsing ─────────────────────────────────────────────────────

/// Header positions of the price columns in one file.
struct ColumnIndex {
    date: usize,
    ticker: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    adj_close: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(path: &Path, headers: &csv::StringRecord) -> Result<Self, LoadError> {
        let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let require = |name: &str| {
            find(name).ok_or_else(|| LoadError::Parse {
                path: path.to_path_buf(),
                line: 1,
                column: name.to_string(),
                value: String::new(),
            })
        };

        Ok(Self {
            date: require("date")?,
            ticker: require("ticker")?,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: require("volume")?,
            adj_close: find("adj_close"),
        })
    }
}

/// Parse one price CSV file into rows, in file order.
pub fn read_price_csv(path: &Path) -> Result<Vec<PriceRow>, LoadError> {
    let file = fs::File::open(path).map_err(|e| LoadError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let file_access = |source: csv::Error| LoadError::FileAccess {
        path: path.to_path_buf(),
        source,
    };

    let headers = reader.headers().map_err(file_access)?.clone();
    let cols = ColumnIndex::from_headers(path, &headers)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(file_access)?;
        let line = record.position().map_or(0, |p| p.line());
        let field = FieldReader {
            path,
            line,
            record: &record,
        };

        rows.push(PriceRow {
            date: field.date("date", cols.date)?,
            ticker: field.text("ticker", cols.ticker)?,
            open: field.price("open", cols.open)?,
            high: field.price("high", cols.high)?,
            low: field.price("low", cols.low)?,
            close: field.price("close", cols.close)?,
            volume: field.volume("volume", cols.volume)?,
            adj_close: match cols.adj_close {
                Some(i) => field.optional_price("adj_close", i)?,
                None => None,
            },
        });
    }

    Ok(rows)
}

/// Typed access to the fields of one record, with errors naming the location.
struct FieldReader<'a> {
    path: &'a Path,
    line: u64,
    record: &'a csv::StringRecord,
}

impl FieldReader<'_> {
    fn raw(&self, idx: usize) -> &str {
        self.record.get(idx).unwrap_or("")
    }

    fn error(&self, column: &str, value: &str) -> LoadError {
        LoadError::Parse {
            path: self.path.to_path_buf(),
            line: self.line,
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    fn text(&self, column: &str, idx: usize) -> Result<String, LoadError> {
        let value = self.raw(idx);
        if value.is_empty() {
            return Err(self.error(column, value));
        }
        Ok(value.to_string())
    }

    /// Accepts `YYYY-MM-DD` and pandas' `YYYY-MM-DD HH:MM:SS` datetimes.
    fn date(&self, column: &str, idx: usize) -> Result<NaiveDate, LoadError> {
        let value = self.raw(idx);
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .or_else(|_| {
                NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date())
            })
            .map_err(|_| self.error(column, value))
    }

    /// Empty cells are missing observations and read as NaN.
    fn price(&self, column: &str, idx: usize) -> Result<f64, LoadError> {
        Ok(self.optional_price(column, idx)?.unwrap_or(f64::NAN))
    }

    fn optional_price(&self, column: &str, idx: usize) -> Result<Option<f64>, LoadError> {
        let value = self.raw(idx);
        if value.is_empty() {
            return Ok(None);
        }
        value
            .parse::<f64>()
            .map(Some)
            .map_err(|_| self.error(column, value))
    }

    /// Integer counts, also accepting float renderings such as `1200.0`.
    fn volume(&self, column: &str, idx: usize) -> Result<u64, LoadError> {
        let value = self.raw(idx);
        if value.is_empty() {
            return Ok(0);
        }
        if let Ok(v) = value.parse::<u64>() {
            return Ok(v);
        }
        match value.parse::<f64>() {
            // `as` would saturate anything past u64::MAX
            Ok(v) if v.is_finite() && v >= 0.0 && v.round() < u64::MAX as f64 => {
                Ok(v.round() as u64)
            }
            _ => Err(self.error(column, value)),
        }
    }
}
