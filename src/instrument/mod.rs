use crate::maths::{round_step_ceil, round_step_floor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub mod error;

use error::CatalogError;

/// Whether an [`Instrument`] is a cash equity or a futures contract.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Stock,
    Future,
}

/// Static trading terms for one symbol: minimum price increment and the
/// currency value of a one-point move.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    kind: InstrumentKind,
    symbol: String,
    tick: f64,
    bpv: f64,
    name: String,
}

impl Instrument {
    /// A stock: tick of one cent, big-point value of 1.
    pub fn stock(symbol: impl Into<String>) -> Self {
        Self::new(InstrumentKind::Stock, symbol.into(), 0.01, 1.0, String::new())
    }

    pub fn stock_named(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(InstrumentKind::Stock, symbol.into(), 0.01, 1.0, name.into())
    }

    pub fn future(symbol: impl Into<String>, tick: f64, bpv: f64) -> Self {
        Self::new(InstrumentKind::Future, symbol.into(), tick, bpv, String::new())
    }

    pub fn future_named(
        symbol: impl Into<String>,
        tick: f64,
        bpv: f64,
        name: impl Into<String>,
    ) -> Self {
        Self::new(InstrumentKind::Future, symbol.into(), tick, bpv, name.into())
    }

    fn new(kind: InstrumentKind, symbol: String, tick: f64, bpv: f64, name: String) -> Self {
        assert!(
            tick > 0.0 && bpv > 0.0,
            "instrument {symbol} requires tick > 0 and bpv > 0"
        );
        Self {
            kind,
            symbol,
            tick,
            bpv,
            name,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn tick(&self) -> f64 {
        self.tick
    }

    /// Big-point value: the currency value of a one-unit price move.
    pub fn bpv(&self) -> f64 {
        self.bpv
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_future(&self) -> bool {
        self.kind == InstrumentKind::Future
    }

    pub fn is_stock(&self) -> bool {
        self.kind == InstrumentKind::Stock
    }
}

/// Re-expresses one provider's prices in another provider's terms.
///
/// For the Euro: priced by one provider as symbol "FN" with bpv 1,250 and
/// tick 0.01, by another as "EUR" with bpv 125,000 and tick 0.0001. The
/// variation stored under the first provider's "FN" is then
/// `{ symbol: "EUR", factor: 100, tick: 0.0001 }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstrumentVariation {
    pub symbol: String,
    pub factor: f64,
    pub tick: f64,
}

impl InstrumentVariation {
    pub fn new(symbol: impl Into<String>, factor: f64, tick: f64) -> Self {
        Self {
            symbol: symbol.into(),
            factor,
            tick,
        }
    }

    /// Converts an original price into the variation's terms.
    pub fn price(&self, original: f64) -> f64 {
        original / self.factor
    }

    /// Converted price rounded up to the variation's tick.
    pub fn tick_ceil(&self, original: f64) -> f64 {
        round_step_ceil(self.price(original), self.tick)
    }

    /// Converted price rounded down to the variation's tick.
    pub fn tick_floor(&self, original: f64) -> f64 {
        round_step_floor(self.price(original), self.tick)
    }
}

/// One `instruments` row of a [`CatalogConfig`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InstrumentRow {
    pub symbol: String,
    #[serde(default = "InstrumentRow::default_kind")]
    pub kind: InstrumentKind,
    pub tick: f64,
    pub bpv: f64,
    #[serde(default, alias = "comment")]
    pub name: String,
    #[serde(default)]
    pub exchange: Option<String>,
}

impl InstrumentRow {
    fn default_kind() -> InstrumentKind {
        InstrumentKind::Future
    }
}

/// One `variations` row of a [`CatalogConfig`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VariationRow {
    pub provider: String,
    pub original_symbol: String,
    pub symbol: String,
    pub factor: f64,
    pub tick: f64,
}

/// The catalog source document: bar-file location settings plus the
/// instrument and variation relations.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub date_format: Option<String>,
    #[serde(default)]
    pub instruments: Vec<InstrumentRow>,
    #[serde(default)]
    pub variations: Vec<VariationRow>,
}

/// Immutable registry of instruments and per-provider variations, plus the
/// bar-file location settings the feed needs.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    directory: String,
    suffix: String,
    date_format: Option<String>,
    instruments: HashMap<String, Instrument>,
    variations: HashMap<String, HashMap<String, InstrumentVariation>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from a parsed [`CatalogConfig`].
    pub fn from_config(config: CatalogConfig) -> Result<Self, CatalogError> {
        let mut catalog = Catalog {
            directory: config.directory,
            suffix: config.suffix,
            date_format: config.date_format,
            instruments: HashMap::new(),
            variations: HashMap::new(),
        };

        for row in config.instruments {
            if row.tick <= 0.0 || row.bpv <= 0.0 {
                return Err(CatalogError::InvalidInstrument { symbol: row.symbol });
            }
            let instrument = match row.kind {
                InstrumentKind::Stock => Instrument::stock_named(row.symbol, row.name),
                InstrumentKind::Future => {
                    Instrument::future_named(row.symbol, row.tick, row.bpv, row.name)
                }
            };
            catalog.insert_instrument(instrument)?;
        }

        for row in config.variations {
            catalog.insert_variation(
                &row.provider,
                &row.original_symbol,
                InstrumentVariation::new(row.symbol, row.factor, row.tick),
            )?;
        }

        Ok(catalog)
    }

    /// Loads and parses a JSON catalog file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::File {
            path: path.display().to_string(),
            source,
        })?;
        let config: CatalogConfig = serde_json::from_str(&contents)?;
        Self::from_config(config)
    }

    pub fn insert_instrument(&mut self, instrument: Instrument) -> Result<(), CatalogError> {
        if self.instruments.contains_key(instrument.symbol()) {
            return Err(CatalogError::DuplicateInstrument(
                instrument.symbol().to_owned(),
            ));
        }
        self.instruments
            .insert(instrument.symbol().to_owned(), instrument);
        Ok(())
    }

    /// Providers are case-insensitive; keys normalise to lowercase.
    pub fn insert_variation(
        &mut self,
        provider: &str,
        original_symbol: &str,
        variation: InstrumentVariation,
    ) -> Result<(), CatalogError> {
        let by_symbol = self.variations.entry(provider.to_lowercase()).or_default();
        if by_symbol.contains_key(original_symbol) {
            return Err(CatalogError::DuplicateVariation {
                provider: provider.to_lowercase(),
                symbol: original_symbol.to_owned(),
            });
        }
        by_symbol.insert(original_symbol.to_owned(), variation);
        Ok(())
    }

    pub fn instrument(&self, symbol: &str) -> Option<&Instrument> {
        self.instruments.get(symbol)
    }

    pub fn variation(&self, provider: &str, symbol: &str) -> Option<&InstrumentVariation> {
        self.variations
            .get(&provider.to_lowercase())
            .and_then(|by_symbol| by_symbol.get(symbol))
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn date_format(&self) -> Option<&str> {
        self.date_format.as_deref()
    }
}
