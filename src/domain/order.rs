use crate::domain::money::{CurrencyType, MoneyValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodType {
    Card,
    BankTransfer,
    Funds,
}

impl PaymentMethodType {
    pub fn is_funds(&self) -> bool {
        matches!(self, Self::Funds)
    }
}

impl FromStr for PaymentMethodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "card" => Ok(Self::Card),
            "bank_transfer" | "bank" => Ok(Self::BankTransfer),
            "funds" => Ok(Self::Funds),
            other => Err(format!("unknown payment method type: {other}")),
        }
    }
}

impl fmt::Display for PaymentMethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Card => "card",
            Self::BankTransfer => "bank_transfer",
            Self::Funds => "funds",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub kind: PaymentMethodType,
    pub fiat_currency: CurrencyType,
}

/// The account the user pays from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodAccount {
    pub label: String,
    pub payment_method: PaymentMethod,
}

impl PaymentMethodAccount {
    pub fn fiat_currency(&self) -> &CurrencyType {
        &self.payment_method.fiat_currency
    }

    /// Id sent with a new order. Funds accounts are identified by currency alone.
    pub fn order_payment_method_id(&self) -> Option<String> {
        if self.payment_method.kind.is_funds() {
            None
        } else {
            Some(self.payment_method.id.clone())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    PendingConfirmation,
    PendingDeposit,
    Finished,
    Cancelled,
    Failed,
}

/// Backend-side representation of a buy order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub identifier: String,
    /// Total fiat cost, fee included.
    pub input_value: MoneyValue,
    pub output_value: MoneyValue,
    pub fee: Option<MoneyValue>,
    pub payment_method: PaymentMethodType,
    pub state: OrderState,
}

/// What the client asks the backend to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateOrderDetails {
    pub payment_method: PaymentMethodType,
    pub fiat_value: MoneyValue,
    pub crypto_value: MoneyValue,
    pub payment_method_id: Option<String>,
}

impl CandidateOrderDetails {
    pub fn buy(
        payment_method: PaymentMethodType,
        fiat_value: MoneyValue,
        crypto_value: MoneyValue,
        payment_method_id: Option<String>,
    ) -> Self {
        Self {
            payment_method,
            fiat_value,
            crypto_value,
            payment_method_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutData {
    pub order: OrderDetails,
}

impl CheckoutData {
    pub fn new(order: OrderDetails) -> Self {
        Self { order }
    }
}

/// Client-side progress of the current order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderLifecycle {
    #[default]
    Uninitialized,
    Quoted,
    OrderCreated,
    Confirmed,
    Cancelled,
    Failed,
}

impl OrderLifecycle {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Cancelled | Self::Failed)
    }
}
