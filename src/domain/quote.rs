use crate::domain::money::{CurrencyType, MoneyValue};
use crate::error::{BuyError, Result};
use serde::{Deserialize, Serialize};

/// A point-in-time exchange rate: one unit of `base` is worth `quote`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub base: MoneyValue,
    pub quote: MoneyValue,
}

impl ExchangeRate {
    pub fn new(base: CurrencyType, quote: MoneyValue) -> Self {
        Self {
            base: MoneyValue::one(base),
            quote,
        }
    }

    /// The same rate expressed in the opposite direction.
    pub fn inverse(&self) -> Result<ExchangeRate> {
        if self.quote.is_zero() {
            return Err(BuyError::InvalidRate(format!(
                "cannot invert zero rate {} -> {}",
                self.base.currency(),
                self.quote.currency()
            )));
        }
        let inverted = self
            .base
            .amount()
            .checked_div(self.quote.amount())
            .ok_or_else(|| BuyError::AmountOverflow(format!("inverse of {}", self.quote)))?;
        Ok(Self::new(
            self.quote.currency().clone(),
            MoneyValue::new(inverted, self.base.currency().clone()),
        ))
    }
}

/// Crypto-to-fiat rate (`source`) alongside its inverse (`destination`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRatePairs {
    pub source: ExchangeRate,
    pub destination: ExchangeRate,
}

impl ExchangeRatePairs {
    pub fn from_rate(rate: ExchangeRate) -> Result<Self> {
        let destination = rate.inverse()?;
        Ok(Self {
            source: rate,
            destination,
        })
    }
}

/// What a buy product is quoted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteProfile {
    SimpleBuy,
}

/// A backend quote for converting a fiat amount into crypto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub estimated_fiat_amount: MoneyValue,
    pub estimated_crypto_amount: MoneyValue,
    pub fee: MoneyValue,
    pub rate: ExchangeRate,
}
