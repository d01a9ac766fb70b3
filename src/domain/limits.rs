use crate::domain::money::{CurrencyType, MoneyValue};
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    #[default]
    Uninitialized,
    CanExecute,
    BelowMinimumLimit,
    OverMaximumLimit,
    OptionInvalid,
}

/// Per-transaction, daily and annual bounds for a payment method and currency pair.
///
/// All bounds are expressed in the currency the user is entering the amount in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLimits {
    pub currency: CurrencyType,
    pub minimum: Option<MoneyValue>,
    pub maximum: Option<MoneyValue>,
    pub maximum_daily: Option<MoneyValue>,
    pub maximum_annual: Option<MoneyValue>,
}

impl TransactionLimits {
    pub fn unbounded(currency: CurrencyType) -> Self {
        Self {
            currency,
            minimum: None,
            maximum: None,
            maximum_daily: None,
            maximum_annual: None,
        }
    }

    pub fn minimum_or_zero(&self) -> MoneyValue {
        self.minimum
            .clone()
            .unwrap_or_else(|| MoneyValue::zero(self.currency.clone()))
    }

    /// The tightest of the configured upper bounds, if any.
    pub fn effective_maximum(&self) -> Result<Option<MoneyValue>> {
        let mut tightest: Option<MoneyValue> = None;
        for bound in [&self.maximum, &self.maximum_daily, &self.maximum_annual]
            .into_iter()
            .flatten()
        {
            tightest = match tightest {
                Some(current) if !bound.try_lt(&current)? => Some(current),
                _ => Some(bound.clone()),
            };
        }
        Ok(tightest)
    }

    /// Classifies `amount` against these limits.
    ///
    /// Produces exactly one of `CanExecute`, `BelowMinimumLimit` or
    /// `OverMaximumLimit`. Bounds are inclusive.
    pub fn validate(&self, amount: &MoneyValue) -> Result<ValidationState> {
        if let Some(maximum) = self.effective_maximum()?
            && amount.try_gt(&maximum)?
        {
            return Ok(ValidationState::OverMaximumLimit);
        }
        if amount.try_lt(&self.minimum_or_zero())? {
            return Ok(ValidationState::BelowMinimumLimit);
        }
        Ok(ValidationState::CanExecute)
    }
}
