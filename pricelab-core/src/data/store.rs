//! Monthly period-file store.
//!
//! Layout: `{data_dir}/{YYYY}/PRICES_{YYYY}-M{MM}.csv`, one file per calendar
//! month, columns `date,ticker,open,high,low,close,volume,adj_close`.
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Merge of new rows into existing months (existing rows win on duplicates)
//! - Resume support: latest stored date per ticker
//! - Per-ticker removal for forced re-downloads

use super::loader::{read_price_csv, LoadError};
use crate::domain::{PriceRow, PriceTable, PRICE_COLUMNS};
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const FILE_PREFIX: &str = "PRICES_";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV write error on {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// An existing period file and the month it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodFile {
    pub year: i32,
    pub month: u32,
    pub path: PathBuf,
}

/// File name for a month: `PRICES_2020-M01.csv`.
pub fn period_file_name(year: i32, month: u32) -> String {
    format!("{FILE_PREFIX}{year}-M{month:02}.csv")
}

/// Inverse of [`period_file_name`].
pub fn parse_period_name(name: &str) -> Option<(i32, u32)> {
    let stem = name.strip_prefix(FILE_PREFIX)?.strip_suffix(".csv")?;
    let (year, month) = stem.split_once("-M")?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

/// Period files under `data_dir` (the root and its year folders), sorted by month.
pub fn discover_period_files(data_dir: &Path) -> Result<Vec<PeriodFile>, LoadError> {
    let mut files = Vec::new();
    collect_period_files(data_dir, &mut files, true)?;
    files.sort_by(|a, b| (a.year, a.month, &a.path).cmp(&(b.year, b.month, &b.path)));
    Ok(files)
}

fn collect_period_files(
    dir: &Path,
    out: &mut Vec<PeriodFile>,
    descend: bool,
) -> Result<(), LoadError> {
    let entries = fs::read_dir(dir).map_err(|e| LoadError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| LoadError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            if descend {
                collect_period_files(&path, out, false)?;
            }
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some((year, month)) = parse_period_name(name) {
            out.push(PeriodFile { year, month, path });
        }
    }
    Ok(())
}

/// The monthly CSV store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct PriceStore {
    data_dir: PathBuf,
}

impl PriceStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the file for a month: `{data_dir}/{year}/PRICES_{year}-M{MM}.csv`.
    pub fn month_path(&self, year: i32, month: u32) -> PathBuf {
        self.data_dir
            .join(year.to_string())
            .join(period_file_name(year, month))
    }

    /// Existing period files, sorted by month. Empty if the directory is absent.
    pub fn period_files(&self) -> Result<Vec<PeriodFile>, StoreError> {
        if !self.data_dir.is_dir() {
            return Ok(Vec::new());
        }
        Ok(discover_period_files(&self.data_dir)?)
    }

    pub fn read_period(&self, path: &Path) -> Result<Vec<PriceRow>, StoreError> {
        Ok(read_price_csv(path)?)
    }

    /// Write rows to `path`, de-duplicated on `(date, ticker)` and sorted.
    ///
    /// Writes are atomic: write to .tmp then rename.
    pub fn write_period(&self, path: &Path, rows: Vec<PriceRow>) -> Result<usize, StoreError> {
        let table = PriceTable::from_rows(rows);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let tmp_path = path.with_extension("csv.tmp");
        write_csv(&tmp_path, &table)?;

        fs::rename(&tmp_path, path).map_err(|e| {
            // Clean up temp file on rename failure
            let _ = fs::remove_file(&tmp_path);
            StoreError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        })?;

        Ok(table.len())
    }

    /// Merge rows into their month files.
    ///
    /// Rows already on disk win over incoming rows with the same
    /// `(date, ticker)`. Returns the row count of each file written.
    pub fn merge_rows(
        &self,
        rows: Vec<PriceRow>,
    ) -> Result<BTreeMap<PathBuf, usize>, StoreError> {
        let mut by_month: BTreeMap<(i32, u32), Vec<PriceRow>> = BTreeMap::new();
        for row in rows {
            by_month
                .entry((row.date.year(), row.date.month()))
                .or_default()
                .push(row);
        }

        let mut written = BTreeMap::new();
        for ((year, month), incoming) in by_month {
            let path = self.month_path(year, month);
            let mut merged = if path.is_file() {
                self.read_period(&path)?
            } else {
                Vec::new()
            };
            let added = incoming.len();
            merged.extend(incoming);
            let count = self.write_period(&path, merged)?;
            log::debug!("{}: merged {added} rows, {count} total", path.display());
            written.insert(path, count);
        }
        Ok(written)
    }

    /// Month of the latest period file, as its first day.
    pub fn last_month_with_data(&self) -> Result<Option<NaiveDate>, StoreError> {
        Ok(self
            .period_files()?
            .last()
            .and_then(|f| NaiveDate::from_ymd_opt(f.year, f.month, 1)))
    }

    /// Latest stored date per ticker across all period files.
    pub fn last_dates(&self) -> Result<HashMap<String, NaiveDate>, StoreError> {
        let mut last: HashMap<String, NaiveDate> = HashMap::new();
        for file in self.period_files()? {
            for row in self.read_period(&file.path)? {
                last.entry(row.ticker)
                    .and_modify(|d| *d = (*d).max(row.date))
                    .or_insert(row.date);
            }
        }
        Ok(last)
    }

    /// Drop every row for `tickers` from the period files, deleting files left
    /// empty. Other tickers' rows are rewritten unchanged. Returns the number of
    /// rows removed.
    pub fn remove_tickers<S: AsRef<str>>(&self, tickers: &[S]) -> Result<usize, StoreError> {
        let drop: HashSet<&str> = tickers.iter().map(|t| t.as_ref()).collect();
        let mut removed = 0;
        for file in self.period_files()? {
            let rows = self.read_period(&file.path)?;
            let before = rows.len();
            let kept: Vec<PriceRow> = rows
                .into_iter()
                .filter(|r| !drop.contains(r.ticker.as_str()))
                .collect();
            if kept.len() == before {
                continue;
            }
            removed += before - kept.len();
            if kept.is_empty() {
                fs::remove_file(&file.path).map_err(|e| StoreError::Io {
                    path: file.path.clone(),
                    source: e,
                })?;
            } else {
                self.write_period(&file.path, kept)?;
            }
        }
        Ok(removed)
    }

    /// Delete every period file. Returns the number removed.
    pub fn clean(&self) -> Result<usize, StoreError> {
        let files = self.period_files()?;
        for file in &files {
            fs::remove_file(&file.path).map_err(|e| StoreError::Io {
                path: file.path.clone(),
                source: e,
            })?;
        }
        Ok(files.len())
    }
}

fn write_csv(path: &Path, table: &PriceTable) -> Result<(), StoreError> {
    let file = fs::File::create(path).map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    write_price_csv(table, file).map_err(|source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a table as period-file CSV: header line, then one record per row.
pub fn write_price_csv<W: io::Write>(table: &PriceTable, out: W) -> Result<(), csv::Error> {
    // Header written explicitly so an empty table still yields a readable file.
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    wtr.write_record(PRICE_COLUMNS)?;
    for row in table {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write a table with only `columns`, in that order. Column names are the
/// canonical ones returned by [`crate::domain::select_columns`].
pub fn write_price_columns<W: io::Write>(
    table: &PriceTable,
    columns: &[&str],
    out: W,
) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    wtr.write_record(columns)?;
    for row in table {
        wtr.write_record(columns.iter().map(|c| row.field(c).unwrap_or_default()))?;
    }
    wtr.flush()?;
    Ok(())
}
