//! Kline download — fills missing cache days from Binance's public archive.
//!
//! Archive layout: `{base}/{SYMBOL}/{interval}/{SYMBOL}-{interval}-{YYYY-MM-DD}.zip`,
//! each holding one header-less CSV whose first six columns are
//! `open_time, open, high, low, close, volume`.
//!
//! Days already on disk are never fetched again. A day that fails to download
//! is logged and skipped; only cache write failures abort.

use std::io::{Cursor, Read};
use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

use sentilab_core::domain::{Kline, KlineInterval};

use crate::data_loader::{parse_open_time, KlineCache, LoadError};

/// Public daily spot kline archive.
pub const BINANCE_ARCHIVE_URL: &str = "https://data.binance.vision/data/spot/daily/klines";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("invalid archive from {origin}: {source}")]
    Archive {
        origin: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("malformed kline CSV in {origin}: {source}")]
    Csv {
        origin: String,
        #[source]
        source: csv::Error,
    },

    #[error("{origin} line {line}: invalid kline row")]
    InvalidRow { origin: String, line: u64 },

    #[error(transparent)]
    Cache(#[from] LoadError),
}

/// A remote source of one day of klines.
///
/// `Ok(None)` means the source has no data for that day (not published yet,
/// or the symbol did not trade).
pub trait KlineSource {
    fn name(&self) -> &str;

    fn fetch_day(
        &self,
        symbol: &str,
        interval: KlineInterval,
        day: NaiveDate,
    ) -> Result<Option<Vec<Kline>>, DownloadError>;
}

// ─── Binance archive ─────────────────────────────────────────────────

pub struct BinanceArchive {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl BinanceArchive {
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_base_url(BINANCE_ARCHIVE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DownloadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("sentilab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DownloadError::Client)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    pub fn archive_url(&self, symbol: &str, interval: KlineInterval, day: NaiveDate) -> String {
        let symbol = symbol.to_uppercase();
        format!(
            "{base}/{symbol}/{interval}/{symbol}-{interval}-{day}.zip",
            base = self.base_url,
            day = day.format("%Y-%m-%d"),
        )
    }

    /// GET with exponential backoff. `Ok(None)` on 404.
    fn get_with_retry(&self, url: &str) -> Result<Option<Vec<u8>>, DownloadError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(self.base_delay * 2u32.pow(attempt - 1));
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Ok(None);
                    }
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
                    {
                        last_error = Some(DownloadError::Http {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                        continue;
                    }
                    if !status.is_success() {
                        return Err(DownloadError::Http {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                    let body = resp.bytes().map_err(|e| DownloadError::Network {
                        url: url.to_string(),
                        message: e.to_string(),
                    })?;
                    return Ok(Some(body.to_vec()));
                }
                Err(e) => {
                    let err = DownloadError::Network {
                        url: url.to_string(),
                        message: e.to_string(),
                    };
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DownloadError::Network {
            url: url.to_string(),
            message: "max retries exceeded".into(),
        }))
    }
}

impl KlineSource for BinanceArchive {
    fn name(&self) -> &str {
        "binance_archive"
    }

    fn fetch_day(
        &self,
        symbol: &str,
        interval: KlineInterval,
        day: NaiveDate,
    ) -> Result<Option<Vec<Kline>>, DownloadError> {
        let url = self.archive_url(symbol, interval, day);
        match self.get_with_retry(&url)? {
            Some(bytes) => parse_archive(&bytes, &url).map(Some),
            None => Ok(None),
        }
    }
}

/// Parse every CSV inside a kline zip archive, sorted by open time.
///
/// A leading header row is tolerated. Rows that fail the OHLC sanity check
/// are dropped with a warning.
pub fn parse_archive(bytes: &[u8], origin: &str) -> Result<Vec<Kline>, DownloadError> {
    let archive_err = |source| DownloadError::Archive {
        origin: origin.to_string(),
        source,
    };
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(archive_err)?;

    let mut klines = Vec::new();
    for i in 0..archive.len() {
        let file = archive.by_index(i).map_err(archive_err)?;
        if file.is_dir() {
            continue;
        }
        klines.extend(parse_archive_csv(file, origin)?);
    }

    let before = klines.len();
    klines.retain(Kline::is_sane);
    if klines.len() < before {
        tracing::warn!(origin, dropped = before - klines.len(), "dropped insane klines");
    }
    klines.sort_by_key(|k| k.open_time);
    Ok(klines)
}

fn parse_archive_csv<R: Read>(reader: R, origin: &str) -> Result<Vec<Kline>, DownloadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut klines = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|source| DownloadError::Csv {
            origin: origin.to_string(),
            source,
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let invalid = || DownloadError::InvalidRow {
            origin: origin.to_string(),
            line,
        };

        let first = record.get(0).unwrap_or_default();
        if line == 1 && first.parse::<i64>().is_err() {
            continue;
        }

        let open_time = parse_open_time(first).ok_or_else(invalid)?;
        let mut prices = [0.0_f64; 5];
        for (slot, column) in prices.iter_mut().zip(1..=5) {
            *slot = record
                .get(column)
                .and_then(|raw| raw.parse().ok())
                .ok_or_else(invalid)?;
        }
        let [open, high, low, close, volume] = prices;
        klines.push(Kline {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        });
    }
    Ok(klines)
}

// ─── Cache filling ───────────────────────────────────────────────────

/// Outcome of `fill_missing_days`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Days already in the cache.
    pub cached: usize,
    pub downloaded: usize,
    /// Days the source has no data for.
    pub unavailable: Vec<NaiveDate>,
    pub failed: Vec<NaiveDate>,
}

/// Download every day in `[start, end]` that has no cache file and write it
/// through the cache.
pub fn fill_missing_days(
    cache: &KlineCache,
    source: &dyn KlineSource,
    symbol: &str,
    interval: KlineInterval,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<DownloadSummary, DownloadError> {
    let mut summary = DownloadSummary::default();
    let days: Vec<NaiveDate> = start.iter_days().take_while(|d| *d <= end).collect();
    let total = days.len();

    for (i, day) in days.into_iter().enumerate() {
        if cache.day_path(symbol, interval, day).exists() {
            summary.cached += 1;
            continue;
        }

        match source.fetch_day(symbol, interval, day) {
            Ok(Some(bars)) if !bars.is_empty() => {
                let path = cache.write_day(symbol, interval, day, &bars)?;
                summary.downloaded += 1;
                tracing::info!(
                    source = source.name(),
                    %day,
                    bars = bars.len(),
                    path = %path.display(),
                    done = i + 1,
                    total,
                    "downloaded klines"
                );
            }
            Ok(_) => {
                tracing::warn!(source = source.name(), %symbol, %interval, %day, "no klines published for day");
                summary.unavailable.push(day);
            }
            Err(e) => {
                tracing::error!(source = source.name(), %day, error = %e, "kline download failed");
                summary.failed.push(day);
            }
        }
    }

    tracing::info!(
        %symbol,
        %interval,
        cached = summary.cached,
        downloaded = summary.downloaded,
        unavailable = summary.unavailable.len(),
        failed = summary.failed.len(),
        "kline download complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::{load_klines, LoadOptions};
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::cell::RefCell;
    use std::io::Write;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, d).unwrap()
    }

    fn zip_of(name: &str, contents: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn bars_for(d: NaiveDate, n: i64) -> Vec<Kline> {
        let open = d.and_hms_opt(0, 0, 0).unwrap().and_utc();
        (0..n)
            .map(|h| Kline {
                open_time: open + ChronoDuration::hours(h),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.5,
                volume: 2.0,
            })
            .collect()
    }

    /// Serves fixed bars for some days and records every request.
    struct FakeSource {
        available: Vec<NaiveDate>,
        broken: Vec<NaiveDate>,
        requests: RefCell<Vec<NaiveDate>>,
    }

    impl KlineSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        fn fetch_day(
            &self,
            _symbol: &str,
            _interval: KlineInterval,
            day: NaiveDate,
        ) -> Result<Option<Vec<Kline>>, DownloadError> {
            self.requests.borrow_mut().push(day);
            if self.broken.contains(&day) {
                return Err(DownloadError::Http {
                    url: day.to_string(),
                    status: 500,
                });
            }
            Ok(self.available.contains(&day).then(|| bars_for(day, 24)))
        }
    }

    #[test]
    fn archive_url_matches_binance_layout() {
        let source = BinanceArchive::with_base_url("https://example.test/klines/").unwrap();
        assert_eq!(
            source.archive_url("btcusdt", KlineInterval::H1, day(1)),
            "https://example.test/klines/BTCUSDT/1h/BTCUSDT-1h-2023-03-01.zip"
        );
    }

    #[test]
    fn parses_headerless_archive() {
        let csv = "\
1677628800000,23141.57,23200.00,23100.00,23150.10,812.5,1677632399999,0,0,0,0,0
1677632400000,23150.10,23180.00,23120.00,23170.00,640.0,1677635999999,0,0,0,0,0
";
        let bytes = zip_of("BTCUSDT-1h-2023-03-01.csv", csv);
        let klines = parse_archive(&bytes, "test").unwrap();
        assert_eq!(klines.len(), 2);
        assert_eq!(
            klines[0].open_time,
            Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(klines[1].close, 23170.0);
        assert_eq!(klines[0].volume, 812.5);
    }

    #[test]
    fn tolerates_header_and_microsecond_stamps() {
        let csv = "\
open_time,open,high,low,close,volume
1677628800000000,1.0,2.0,0.5,1.5,10
";
        let klines = parse_archive(&zip_of("k.csv", csv), "test").unwrap();
        assert_eq!(klines.len(), 1);
        assert_eq!(
            klines[0].open_time,
            Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn drops_insane_rows() {
        let csv = "1677628800000,10,9,11,10,1\n1677632400000,10,11,9,10,1\n";
        let klines = parse_archive(&zip_of("k.csv", csv), "test").unwrap();
        assert_eq!(klines.len(), 1);
    }

    #[test]
    fn garbage_bytes_are_an_archive_error() {
        let err = parse_archive(b"not a zip", "test").unwrap_err();
        assert!(matches!(err, DownloadError::Archive { .. }));
    }

    #[test]
    fn non_numeric_price_is_an_invalid_row() {
        let csv = "1677628800000,10,11,9,10,1\n1677632400000,ten,11,9,10,1\n";
        let err = parse_archive(&zip_of("k.csv", csv), "test").unwrap_err();
        assert!(matches!(err, DownloadError::InvalidRow { line: 2, .. }));
    }

    #[test]
    fn fills_only_missing_days_and_loads_them() {
        let dir = tempfile::tempdir().unwrap();
        let cache = KlineCache::new(dir.path());
        cache
            .write_day("BTCUSDT", KlineInterval::H1, day(1), &bars_for(day(1), 24))
            .unwrap();
        let source = FakeSource {
            available: vec![day(1), day(2)],
            broken: vec![day(4)],
            requests: RefCell::new(Vec::new()),
        };

        let summary =
            fill_missing_days(&cache, &source, "BTCUSDT", KlineInterval::H1, day(1), day(4))
                .unwrap();

        assert_eq!(*source.requests.borrow(), vec![day(2), day(3), day(4)]);
        assert_eq!(summary.cached, 1);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.unavailable, vec![day(3)]);
        assert_eq!(summary.failed, vec![day(4)]);

        let loaded = load_klines(
            &cache,
            "BTCUSDT",
            KlineInterval::H1,
            &LoadOptions {
                start: day(1),
                end: day(2),
                synthetic: false,
            },
        )
        .unwrap();
        assert_eq!(loaded.klines.len(), 48);
        assert!(loaded.missing_days.is_empty());
    }
}
