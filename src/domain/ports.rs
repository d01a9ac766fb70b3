use super::limits::TransactionLimits;
use super::money::{CurrencyType, MoneyValue};
use super::order::{CandidateOrderDetails, CheckoutData, PaymentMethod};
use super::quote::{Quote, QuoteProfile};
use crate::error::NetworkError;
use async_trait::async_trait;

pub type NetworkResult<T> = std::result::Result<T, NetworkError>;

#[async_trait]
pub trait CurrencyConversionService: Send + Sync {
    /// Price of one unit of `from` expressed in `to`.
    async fn conversion_rate(
        &self,
        from: &CurrencyType,
        to: &CurrencyType,
    ) -> NetworkResult<MoneyValue>;

    async fn convert(&self, value: &MoneyValue, to: &CurrencyType) -> NetworkResult<MoneyValue>;
}

#[async_trait]
pub trait TransactionLimitsService: Send + Sync {
    async fn fetch_limits(
        &self,
        payment_method: &PaymentMethod,
        target_currency: &CurrencyType,
        limits_currency: &CurrencyType,
    ) -> NetworkResult<TransactionLimits>;
}

#[async_trait]
pub trait OrderQuoteService: Send + Sync {
    async fn get_quote(
        &self,
        profile: QuoteProfile,
        from: &CurrencyType,
        to: &CurrencyType,
        amount: &MoneyValue,
    ) -> NetworkResult<Quote>;
}

#[async_trait]
pub trait OrderCreationService: Send + Sync {
    async fn create(&self, candidate: CandidateOrderDetails) -> NetworkResult<CheckoutData>;
}

#[async_trait]
pub trait OrderConfirmationService: Send + Sync {
    async fn confirm(&self, checkout: CheckoutData) -> NetworkResult<CheckoutData>;
}

#[async_trait]
pub trait OrderCancellationService: Send + Sync {
    async fn cancel_order(&self, identifier: &str) -> NetworkResult<()>;
}

#[async_trait]
pub trait BalanceService: Send + Sync {
    /// Balance available to the given payment method, in its own currency.
    async fn balance(&self, payment_method: &PaymentMethod) -> NetworkResult<MoneyValue>;
}

pub type CurrencyConversionServiceBox = Box<dyn CurrencyConversionService>;
pub type TransactionLimitsServiceBox = Box<dyn TransactionLimitsService>;
pub type OrderQuoteServiceBox = Box<dyn OrderQuoteService>;
pub type OrderCreationServiceBox = Box<dyn OrderCreationService>;
pub type OrderConfirmationServiceBox = Box<dyn OrderConfirmationService>;
pub type OrderCancellationServiceBox = Box<dyn OrderCancellationService>;
pub type BalanceServiceBox = Box<dyn BalanceService>;
