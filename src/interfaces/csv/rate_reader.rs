use crate::domain::money::CurrencyType;
use crate::error::{BuyError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a rates file: the price of one unit of `crypto` in `fiat`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct RateRecord {
    pub crypto: String,
    pub fiat: String,
    pub price: Decimal,
}

impl RateRecord {
    pub fn currencies(&self) -> (CurrencyType, CurrencyType) {
        (
            CurrencyType::crypto(&self.crypto),
            CurrencyType::fiat(&self.fiat),
        )
    }

    fn validated(self) -> Result<Self> {
        if self.price > Decimal::ZERO {
            Ok(self)
        } else {
            Err(BuyError::InvalidRate(format!(
                "price for {}/{} must be positive",
                self.crypto, self.fiat
            )))
        }
    }
}

/// Reads exchange rates from a CSV source with a `crypto,fiat,price` header.
pub struct RateReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RateReader<R> {
    /// Creates a new `RateReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and validates rate rows.
    pub fn rates(self) -> impl Iterator<Item = Result<RateRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BuyError::from).and_then(RateRecord::validated))
    }
}
