//! Kline loading from the local day-file cache.
//!
//! Layout: `{root}/{SYMBOL}/{interval}/{YYYY-MM-DD}.csv`, one file per UTC day,
//! headered `Timestamp,Open,High,Low,Close,Volume`. Fallback policy:
//! 1. Load every day file present in the requested range
//! 2. If no bars were found and `synthetic` is set → generate synthetic bars (tagged)
//! 3. Otherwise → fail with a clear error
//!
//! Missing individual days are logged and skipped; a gap never aborts the run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use sentilab_core::domain::{Kline, KlineInterval};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(
        "no cached klines for {symbol} {interval} between {start} and {end} in {dir} (use --download to fetch it or --synthetic for synthetic data)"
    )]
    NoData {
        symbol: String,
        interval: KlineInterval,
        start: NaiveDate,
        end: NaiveDate,
        dir: PathBuf,
    },

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed kline file {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("{path} line {line}: invalid timestamp '{value}'")]
    InvalidTimestamp {
        path: PathBuf,
        line: u64,
        value: String,
    },
}

/// Options controlling how klines are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// First day (inclusive).
    pub start: NaiveDate,
    /// Last day (inclusive).
    pub end: NaiveDate,
    /// Generate synthetic bars when no cached data exists.
    pub synthetic: bool,
}

/// Result of loading klines, including provenance.
#[derive(Debug, Clone)]
pub struct LoadedKlines {
    pub symbol: String,
    pub interval: KlineInterval,
    /// Sorted ascending by open time.
    pub klines: Vec<Kline>,
    /// BLAKE3 over all bar fields.
    pub dataset_hash: String,
    pub has_synthetic: bool,
    /// Days in range with no cache file.
    pub missing_days: Vec<NaiveDate>,
}

// ─── Day-file cache ──────────────────────────────────────────────────

/// Day-partitioned kline CSV store.
#[derive(Debug, Clone)]
pub struct KlineCache {
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct KlineRow {
    #[serde(rename = "Timestamp", alias = "timestamp", alias = "open_time")]
    timestamp: String,
    #[serde(rename = "Open", alias = "open")]
    open: f64,
    #[serde(rename = "High", alias = "high")]
    high: f64,
    #[serde(rename = "Low", alias = "low")]
    low: f64,
    #[serde(rename = "Close", alias = "close")]
    close: f64,
    #[serde(rename = "Volume", alias = "volume")]
    volume: f64,
}

impl KlineCache {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn day_path(&self, symbol: &str, interval: KlineInterval, day: NaiveDate) -> PathBuf {
        self.root
            .join(symbol.to_uppercase())
            .join(interval.as_str())
            .join(format!("{}.csv", day.format("%Y-%m-%d")))
    }

    /// Load one day. `Ok(None)` when the file does not exist.
    pub fn load_day(
        &self,
        symbol: &str,
        interval: KlineInterval,
        day: NaiveDate,
    ) -> Result<Option<Vec<Kline>>, LoadError> {
        let path = self.day_path(symbol, interval, day);
        if !path.exists() {
            return Ok(None);
        }
        parse_kline_file(&path).map(Some)
    }

    /// Write one day file atomically (temp file, then rename).
    pub fn write_day(
        &self,
        symbol: &str,
        interval: KlineInterval,
        day: NaiveDate,
        klines: &[Kline],
    ) -> Result<PathBuf, LoadError> {
        let path = self.day_path(symbol, interval, day);
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| LoadError::Io { path, source }
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let tmp = path.with_extension("csv.tmp");
        let csv_err = |source| LoadError::Csv {
            path: tmp.clone(),
            source,
        };
        let mut wtr = csv::Writer::from_path(&tmp).map_err(csv_err)?;
        wtr.write_record(["Timestamp", "Open", "High", "Low", "Close", "Volume"])
            .map_err(csv_err)?;
        for k in klines {
            wtr.write_record([
                k.open_time.timestamp_millis().to_string(),
                k.open.to_string(),
                k.high.to_string(),
                k.low.to_string(),
                k.close.to_string(),
                k.volume.to_string(),
            ])
            .map_err(csv_err)?;
        }
        wtr.flush().map_err(io_err(&tmp))?;
        drop(wtr);
        std::fs::rename(&tmp, &path).map_err(io_err(&path))?;
        Ok(path)
    }
}

fn parse_kline_file(path: &Path) -> Result<Vec<Kline>, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = rdr.headers().map_err(csv_err)?.clone();

    let mut klines = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(csv_err)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row: KlineRow = record.deserialize(Some(&headers)).map_err(csv_err)?;
        let open_time =
            parse_open_time(&row.timestamp).ok_or_else(|| LoadError::InvalidTimestamp {
                path: path.to_path_buf(),
                line,
                value: row.timestamp.clone(),
            })?;
        klines.push(Kline {
            open_time,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(klines)
}

/// Epoch milliseconds (microseconds are detected and scaled down), or
/// `YYYY-MM-DD HH:MM:SS` in UTC.
pub(crate) fn parse_open_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(n) = raw.parse::<i64>() {
        let millis = if n >= 1_000_000_000_000_000 { n / 1000 } else { n };
        return DateTime::from_timestamp_millis(millis);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

// ─── Loading ─────────────────────────────────────────────────────────

/// Load klines for `symbol` over the option's date range.
pub fn load_klines(
    cache: &KlineCache,
    symbol: &str,
    interval: KlineInterval,
    opts: &LoadOptions,
) -> Result<LoadedKlines, LoadError> {
    let mut klines = Vec::new();
    let mut missing_days = Vec::new();

    for day in opts.start.iter_days().take_while(|d| *d <= opts.end) {
        match cache.load_day(symbol, interval, day)? {
            Some(mut bars) => klines.append(&mut bars),
            None => {
                tracing::warn!(%symbol, %interval, %day, "no kline file for day, skipping");
                missing_days.push(day);
            }
        }
    }

    let mut has_synthetic = false;
    if klines.is_empty() {
        if !opts.synthetic {
            return Err(LoadError::NoData {
                symbol: symbol.to_string(),
                interval,
                start: opts.start,
                end: opts.end,
                dir: cache.root().to_path_buf(),
            });
        }
        tracing::warn!(
            %symbol,
            "generating synthetic klines; results will be tagged as synthetic"
        );
        klines = generate_synthetic_klines(symbol, interval, opts.start, opts.end);
        has_synthetic = true;
    }

    klines.sort_by_key(|k| k.open_time);
    let dataset_hash = compute_dataset_hash(symbol, &klines);
    tracing::info!(
        %symbol,
        %interval,
        bars = klines.len(),
        missing = missing_days.len(),
        "loaded klines"
    );

    Ok(LoadedKlines {
        symbol: symbol.to_string(),
        interval,
        klines,
        dataset_hash,
        has_synthetic,
        missing_days,
    })
}

/// Deterministic BLAKE3 hash over the symbol and every bar field.
pub fn compute_dataset_hash(symbol: &str, klines: &[Kline]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_bytes());
    for k in klines {
        hasher.update(&k.open_time.timestamp_millis().to_le_bytes());
        hasher.update(&k.open.to_le_bytes());
        hasher.update(&k.high.to_le_bytes());
        hasher.update(&k.low.to_le_bytes());
        hasher.update(&k.close.to_le_bytes());
        hasher.update(&k.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Random-walk klines, one per interval from `start` 00:00 UTC through the end of `end`.
///
/// Seeded from the symbol, so the same symbol always yields the same series.
pub fn generate_synthetic_klines(
    symbol: &str,
    interval: KlineInterval,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<Kline> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let step = interval.duration();
    // Per-bar volatility scaled from ~3% daily.
    let vol = 0.03 / (interval.bars_per_day() as f64).sqrt();

    let Some(first) = start.and_hms_opt(0, 0, 0) else {
        return Vec::new();
    };
    let mut open_time = first.and_utc();
    let stop = match end.succ_opt().and_then(|d| d.and_hms_opt(0, 0, 0)) {
        Some(t) => t.and_utc(),
        None => return Vec::new(),
    };

    let mut klines = Vec::new();
    let mut price = 100.0_f64;
    while open_time < stop {
        let ret: f64 = rng.gen_range(-vol..vol);
        let open = price;
        let close = price * (1.0 + ret);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..vol / 3.0));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..vol / 3.0));
        let volume = rng.gen_range(10.0..1_000.0);

        klines.push(Kline {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        });
        price = close;
        open_time += step;
    }
    klines
}
