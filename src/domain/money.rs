use crate::domain::quote::ExchangeRate;
use crate::error::{BuyError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

const FIAT_PRECISION: u32 = 2;
const CRYPTO_PRECISION: u32 = 8;

/// A currency code tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "lowercase")]
pub enum CurrencyType {
    Fiat(String),
    Crypto(String),
}

impl CurrencyType {
    pub fn fiat(code: &str) -> Self {
        Self::Fiat(code.to_uppercase())
    }

    pub fn crypto(code: &str) -> Self {
        Self::Crypto(code.to_uppercase())
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Fiat(code) | Self::Crypto(code) => code,
        }
    }

    pub fn is_fiat(&self) -> bool {
        matches!(self, Self::Fiat(_))
    }

    /// Number of decimal places amounts in this currency are rounded to.
    pub fn precision(&self) -> u32 {
        match self {
            Self::Fiat(_) => FIAT_PRECISION,
            Self::Crypto(_) => CRYPTO_PRECISION,
        }
    }
}

impl fmt::Display for CurrencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An amount denominated in a specific currency.
///
/// Unlike a bare `Decimal`, a `MoneyValue` refuses to be added to, subtracted from
/// or compared with a value in another currency. Every such operation returns
/// [`BuyError::CurrencyMismatch`] instead of producing a meaningless number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyValue {
    amount: Decimal,
    currency: CurrencyType,
}

impl MoneyValue {
    pub fn new(amount: Decimal, currency: CurrencyType) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: CurrencyType) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn one(currency: CurrencyType) -> Self {
        Self::new(Decimal::ONE, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &CurrencyType {
        &self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_fiat(&self) -> bool {
        self.currency.is_fiat()
    }

    fn ensure_same_currency(&self, other: &MoneyValue) -> Result<()> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(BuyError::CurrencyMismatch {
                expected: self.currency.clone(),
                actual: other.currency.clone(),
            })
        }
    }

    fn overflow(&self, operation: &str, rhs: Decimal) -> BuyError {
        BuyError::AmountOverflow(format!("{} {operation} {rhs}", self))
    }

    pub fn checked_add(&self, rhs: &MoneyValue) -> Result<MoneyValue> {
        self.ensure_same_currency(rhs)?;
        let sum = self
            .amount
            .checked_add(rhs.amount)
            .ok_or_else(|| self.overflow("+", rhs.amount))?;
        Ok(Self::new(sum, self.currency.clone()))
    }

    pub fn checked_sub(&self, rhs: &MoneyValue) -> Result<MoneyValue> {
        self.ensure_same_currency(rhs)?;
        let difference = self
            .amount
            .checked_sub(rhs.amount)
            .ok_or_else(|| self.overflow("-", rhs.amount))?;
        Ok(Self::new(difference, self.currency.clone()))
    }

    pub fn try_cmp(&self, other: &MoneyValue) -> Result<Ordering> {
        self.ensure_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    pub fn try_lt(&self, other: &MoneyValue) -> Result<bool> {
        Ok(self.try_cmp(other)? == Ordering::Less)
    }

    pub fn try_gt(&self, other: &MoneyValue) -> Result<bool> {
        Ok(self.try_cmp(other)? == Ordering::Greater)
    }

    /// Converts this value into the rate's quote currency.
    ///
    /// The rate's base must be denominated in this value's currency. The result is
    /// rounded to the precision of the quote currency, midpoints away from zero.
    pub fn convert(&self, rate: &ExchangeRate) -> Result<MoneyValue> {
        self.ensure_same_currency(&rate.base)?;
        if rate.base.is_zero() {
            return Err(BuyError::InvalidRate(format!(
                "zero base amount for {}",
                rate.base.currency
            )));
        }
        let target = rate.quote.currency.clone();
        let converted = self
            .amount
            .checked_mul(rate.quote.amount)
            .and_then(|product| product.checked_div(rate.base.amount))
            .ok_or_else(|| self.overflow("*", rate.quote.amount))?
            .round_dp_with_strategy(target.precision(), RoundingStrategy::MidpointAwayFromZero);
        Ok(Self::new(converted, target))
    }
}

impl fmt::Display for MoneyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount.normalize(), self.currency)
    }
}
