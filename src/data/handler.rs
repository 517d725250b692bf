use crate::data::error::DataError;
use crate::data::market::Bar;
use crate::instrument::Catalog;
use crate::instrument::error::CatalogError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::VecDeque;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Producer of bars in global non-decreasing timestamp order across a
/// subscribed symbol set.
///
/// Pull-based: the broker drains the feed with [`BarFeed::next_bar`] until
/// it returns `Ok(None)`.
pub trait BarFeed {
    /// The instrument catalog this feed was configured with.
    fn catalog(&self) -> &Catalog;

    /// Registers a per-symbol stream. Re-subscribing is a no-op.
    fn subscribe(&mut self, symbol: &str);

    /// Drops a stream. No-op if the symbol was never subscribed.
    fn unsubscribe(&mut self, symbol: &str);

    /// Drops all subscriptions; the catalog is retained.
    fn reset(&mut self);

    /// Returns the next bar in timestamp order, or `Ok(None)` once every
    /// stream is exhausted.
    fn next_bar(&mut self) -> Result<Option<Bar>, DataError>;
}

/// Parses a bar-file timestamp, either with the catalog's configured format
/// or through a chain of commonly seen defaults.
fn parse_timestamp(value: &str, format: Option<&str>) -> Option<DateTime<Utc>> {
    if let Some(format) = format {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Some(datetime.and_utc());
        }
        return NaiveDate::parse_from_str(value, format)
            .ok()
            .map(|date| date.and_hms_opt(0, 0, 0).unwrap().and_utc());
    }

    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.with_timezone(&Utc));
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(datetime.and_utc());
    }
    for format in ["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date.and_hms_opt(0, 0, 0).unwrap().and_utc());
        }
    }
    None
}

/// Loads a whole per-symbol bar file:
/// `date, open, high, low, close[, volume[, open_interest]]`.
fn load_bar_file(
    symbol: &str,
    path: &str,
    date_format: Option<&str>,
) -> Result<VecDeque<Bar>, DataError> {
    let file = File::open(path).map_err(|source| DataError::File {
        path: path.to_owned(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut bars = VecDeque::new();
    let mut expected_columns: Option<usize> = None;
    let mut line: u64 = 0;

    for record in reader.records() {
        line += 1;
        let record = record.map_err(|source| DataError::Csv {
            path: path.to_owned(),
            source,
        })?;

        // Every line must agree on the column count
        match expected_columns {
            None => {
                if record.len() < 5 {
                    return Err(DataError::ColumnCount {
                        path: path.to_owned(),
                        line,
                        found: record.len(),
                        expected: 5,
                    });
                }
                expected_columns = Some(record.len());
            }
            Some(expected) => {
                if record.len() != expected {
                    return Err(DataError::ColumnCount {
                        path: path.to_owned(),
                        line,
                        found: record.len(),
                        expected,
                    });
                }
            }
        }

        let timestamp =
            parse_timestamp(&record[0], date_format).ok_or_else(|| DataError::Timestamp {
                path: path.to_owned(),
                line,
                value: record[0].to_owned(),
            })?;

        let numeric = |value: &str| -> Result<f64, DataError> {
            value.parse::<f64>().map_err(|_| DataError::Numeric {
                path: path.to_owned(),
                line,
                value: value.to_owned(),
            })
        };
        let unsigned = |value: &str| -> Result<u64, DataError> {
            value.parse::<u64>().map_err(|_| DataError::Numeric {
                path: path.to_owned(),
                line,
                value: value.to_owned(),
            })
        };

        let mut bar = Bar::new(
            symbol,
            timestamp,
            numeric(&record[1])?,
            numeric(&record[2])?,
            numeric(&record[3])?,
            numeric(&record[4])?,
        );
        bar.volume = match record.get(5) {
            Some(value) => Some(unsigned(value)?),
            None => Some(0),
        };
        bar.open_interest = match record.get(6) {
            Some(value) => Some(unsigned(value)?),
            None => None,
        };

        if !bar.is_well_formed() {
            return Err(DataError::MalformedBar {
                path: path.to_owned(),
                line,
            });
        }

        bars.push_back(bar);
    }

    if let Some(last) = bars.back_mut() {
        last.is_last = true;
    }

    debug!(symbol, path, bars = bars.len(), "loaded bar file");
    Ok(bars)
}

/// One subscribed symbol's stream. The file loads lazily on first access so
/// data-shape errors surface during the replay they abort.
struct BarFileReader {
    symbol: String,
    path: String,
    date_format: Option<String>,
    bars: Option<VecDeque<Bar>>,
}

impl BarFileReader {
    fn new(symbol: &str, path: String, date_format: Option<String>) -> Self {
        Self {
            symbol: symbol.to_owned(),
            path,
            date_format,
            bars: None,
        }
    }

    fn ensure_loaded(&mut self) -> Result<&mut VecDeque<Bar>, DataError> {
        if self.bars.is_none() {
            self.bars = Some(load_bar_file(
                &self.symbol,
                &self.path,
                self.date_format.as_deref(),
            )?);
        }
        Ok(self.bars.as_mut().unwrap())
    }

    fn peek(&mut self) -> Result<Option<&Bar>, DataError> {
        Ok(self.ensure_loaded()?.front())
    }

    fn next(&mut self) -> Result<Option<Bar>, DataError> {
        Ok(self.ensure_loaded()?.pop_front())
    }
}

/// [`BarFeed`] over per-symbol CSV files, merged into one chronological
/// stream by a linear min-scan over each reader's next bar.
///
/// Timestamp ties resolve to the earliest subscription, so emission order
/// is stable across runs given the same subscription order.
pub struct HistoricalBarFeed {
    catalog: Catalog,
    readers: Vec<BarFileReader>,
}

impl HistoricalBarFeed {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            readers: Vec::new(),
        }
    }

    /// Loads the catalog (settings, instruments, variations) from a JSON
    /// file. Replaces any previously loaded catalog; subscriptions are kept.
    pub fn configure(&mut self, path: impl AsRef<Path>) -> Result<(), CatalogError> {
        self.catalog = Catalog::from_json_file(path)?;
        Ok(())
    }

    fn file_path(&self, symbol: &str) -> String {
        format!("{}{}{}", self.catalog.directory(), symbol, self.catalog.suffix())
    }
}

impl BarFeed for HistoricalBarFeed {
    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn subscribe(&mut self, symbol: &str) {
        if self.readers.iter().any(|reader| reader.symbol == symbol) {
            return;
        }
        let path = self.file_path(symbol);
        info!(symbol, %path, "subscribed");
        self.readers.push(BarFileReader::new(
            symbol,
            path,
            self.catalog.date_format().map(str::to_owned),
        ));
    }

    fn unsubscribe(&mut self, symbol: &str) {
        self.readers.retain(|reader| reader.symbol != symbol);
    }

    fn reset(&mut self) {
        self.readers.clear();
    }

    fn next_bar(&mut self) -> Result<Option<Bar>, DataError> {
        let mut min_timestamp = DateTime::<Utc>::MAX_UTC;
        let mut min_index = None;

        for (index, reader) in self.readers.iter_mut().enumerate() {
            if let Some(bar) = reader.peek()? {
                if bar.timestamp < min_timestamp {
                    min_timestamp = bar.timestamp;
                    min_index = Some(index);
                }
            }
        }

        match min_index {
            Some(index) => self.readers[index].next(),
            None => Ok(None),
        }
    }
}
