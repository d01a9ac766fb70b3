use crate::domain::limits::{TransactionLimits, ValidationState};
use crate::domain::money::{CurrencyType, MoneyValue};
use crate::domain::order::OrderDetails;
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeLevel {
    None,
    Regular,
    Priority,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSelection {
    pub selected_level: FeeLevel,
    pub available_levels: Vec<FeeLevel>,
    pub asset: CurrencyType,
}

impl FeeSelection {
    /// A selection offering no fee levels at all, as used by buy flows.
    pub fn empty(asset: CurrencyType) -> Self {
        Self {
            selected_level: FeeLevel::None,
            available_levels: vec![FeeLevel::None],
            asset,
        }
    }
}

/// A line shown to the user before the buy is executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionConfirmation {
    BuyCryptoValue { value: MoneyValue },
    BuyExchangeRateValue { rate: MoneyValue, base_code: String },
    BuyPaymentMethod { name: String },
    TransactionFee { fee: MoneyValue },
    Total { total: MoneyValue },
}

/// The in-progress state of a buy, rebuilt on every amount update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub amount: MoneyValue,
    pub available: MoneyValue,
    pub fee_amount: MoneyValue,
    pub fee_for_full_available: MoneyValue,
    pub fee_selection: FeeSelection,
    pub selected_fiat_currency: CurrencyType,
    pub limits: TransactionLimits,
    pub validation_state: ValidationState,
    pub confirmations: Vec<TransactionConfirmation>,
}

impl PendingTransaction {
    pub fn minimum_limit(&self) -> MoneyValue {
        self.limits.minimum_or_zero()
    }

    /// Largest amount the user may spend: the tightest limit, or the full balance
    /// when no upper limit is set.
    pub fn max_spendable(&self) -> Result<MoneyValue> {
        Ok(self
            .limits
            .effective_maximum()?
            .unwrap_or_else(|| self.available.clone()))
    }

    pub fn with_validation_state(mut self, state: ValidationState) -> Self {
        self.validation_state = state;
        self
    }

    pub fn with_confirmations(mut self, confirmations: Vec<TransactionConfirmation>) -> Self {
        self.confirmations = confirmations;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionResult {
    Hashed {
        tx_hash: String,
        amount: MoneyValue,
        order: OrderDetails,
    },
}

impl TransactionResult {
    pub fn tx_hash(&self) -> &str {
        match self {
            Self::Hashed { tx_hash, .. } => tx_hash,
        }
    }
}
