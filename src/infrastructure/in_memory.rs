use crate::domain::limits::TransactionLimits;
use crate::domain::money::{CurrencyType, MoneyValue};
use crate::domain::order::{
    CandidateOrderDetails, CheckoutData, OrderDetails, OrderState, PaymentMethod,
    PaymentMethodType,
};
use crate::domain::ports::{
    BalanceService, CurrencyConversionService, NetworkResult, OrderCancellationService,
    OrderConfirmationService, OrderCreationService, OrderQuoteService, TransactionLimitsService,
};
use crate::domain::quote::{ExchangeRate, Quote, QuoteProfile};
use crate::error::NetworkError;
use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Backend calls that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOperation {
    ConversionRate,
    Limits,
    Quote,
    CreateOrder,
    ConfirmOrder,
    CancelOrder,
    Balance,
}

#[derive(Default)]
struct BackendState {
    rates: HashMap<(CurrencyType, CurrencyType), Decimal>,
    limits: HashMap<String, TransactionLimits>,
    balances: HashMap<String, MoneyValue>,
    fee_bps: HashMap<PaymentMethodType, u32>,
    orders: HashMap<String, OrderDetails>,
    failures: HashMap<BackendOperation, NetworkError>,
}

#[derive(Default)]
struct CallCounters {
    limits: AtomicUsize,
    quotes: AtomicUsize,
    orders_created: AtomicUsize,
}

/// A trading backend held entirely in memory.
///
/// Implements every port the buy engine needs. Cloning is cheap and every clone
/// shares the same state, so one backend can be handed to the engine once per port.
/// Any call can be forced to fail with [`InMemoryBackend::fail`].
#[derive(Default, Clone)]
pub struct InMemoryBackend {
    state: Arc<RwLock<BackendState>>,
    calls: Arc<CallCounters>,
}

impl InMemoryBackend {
    /// Creates a new, empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BackendState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BackendState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the price of one unit of `from` in `to`. The reverse direction is derived.
    pub fn set_rate(&self, from: CurrencyType, to: CurrencyType, price: Decimal) {
        self.write().rates.insert((from, to), price);
    }

    pub fn set_limits(&self, payment_method_id: &str, limits: TransactionLimits) {
        self.write()
            .limits
            .insert(payment_method_id.to_string(), limits);
    }

    pub fn set_balance(&self, payment_method_id: &str, balance: MoneyValue) {
        self.write()
            .balances
            .insert(payment_method_id.to_string(), balance);
    }

    /// Fee charged on orders paid with `kind`, in basis points of the fiat amount.
    pub fn set_fee_bps(&self, kind: PaymentMethodType, bps: u32) {
        self.write().fee_bps.insert(kind, bps);
    }

    pub fn fail(&self, operation: BackendOperation, error: NetworkError) {
        self.write().failures.insert(operation, error);
    }

    pub fn recover(&self, operation: BackendOperation) {
        self.write().failures.remove(&operation);
    }

    pub fn order(&self, identifier: &str) -> Option<OrderDetails> {
        self.read().orders.get(identifier).cloned()
    }

    pub fn limits_calls(&self) -> usize {
        self.calls.limits.load(Ordering::SeqCst)
    }

    pub fn quote_calls(&self) -> usize {
        self.calls.quotes.load(Ordering::SeqCst)
    }

    pub fn orders_created(&self) -> usize {
        self.calls.orders_created.load(Ordering::SeqCst)
    }

    fn check(&self, operation: BackendOperation) -> NetworkResult<()> {
        match self.read().failures.get(&operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn price(&self, from: &CurrencyType, to: &CurrencyType) -> NetworkResult<Decimal> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        let state = self.read();
        if let Some(price) = state.rates.get(&(from.clone(), to.clone())) {
            return Ok(*price);
        }
        match state.rates.get(&(to.clone(), from.clone())) {
            Some(price) if !price.is_zero() => Decimal::ONE
                .checked_div(*price)
                .ok_or_else(|| unprocessable(format!("rate {from} -> {to} overflows"))),
            _ => Err(NetworkError::NotFound(format!("rate {from} -> {to}"))),
        }
    }

    fn convert_value(&self, value: &MoneyValue, to: &CurrencyType) -> NetworkResult<MoneyValue> {
        let price = self.price(value.currency(), to)?;
        let amount = value
            .amount()
            .checked_mul(price)
            .ok_or_else(|| unprocessable(format!("converting {value} to {to} overflows")))?
            .round_dp_with_strategy(to.precision(), RoundingStrategy::MidpointAwayFromZero);
        Ok(MoneyValue::new(amount, to.clone()))
    }

    fn convert_bound(
        &self,
        bound: &Option<MoneyValue>,
        to: &CurrencyType,
    ) -> NetworkResult<Option<MoneyValue>> {
        bound
            .as_ref()
            .map(|value| self.convert_value(value, to))
            .transpose()
    }

    fn fee_for(
        &self,
        kind: PaymentMethodType,
        fiat_value: &MoneyValue,
    ) -> NetworkResult<MoneyValue> {
        let bps = self.read().fee_bps.get(&kind).copied().unwrap_or(0);
        let fee = fiat_value
            .amount()
            .checked_mul(Decimal::from(bps))
            .ok_or_else(|| unprocessable(format!("fee on {fiat_value} overflows")))?
            / Decimal::from(10_000);
        let fee = fee.round_dp_with_strategy(
            fiat_value.currency().precision(),
            RoundingStrategy::MidpointAwayFromZero,
        );
        Ok(MoneyValue::new(fee, fiat_value.currency().clone()))
    }
}

fn unprocessable(message: String) -> NetworkError {
    NetworkError::Server {
        status: 422,
        message,
    }
}

#[async_trait]
impl CurrencyConversionService for InMemoryBackend {
    async fn conversion_rate(
        &self,
        from: &CurrencyType,
        to: &CurrencyType,
    ) -> NetworkResult<MoneyValue> {
        self.check(BackendOperation::ConversionRate)?;
        Ok(MoneyValue::new(self.price(from, to)?, to.clone()))
    }

    async fn convert(&self, value: &MoneyValue, to: &CurrencyType) -> NetworkResult<MoneyValue> {
        self.check(BackendOperation::ConversionRate)?;
        self.convert_value(value, to)
    }
}

#[async_trait]
impl TransactionLimitsService for InMemoryBackend {
    async fn fetch_limits(
        &self,
        payment_method: &PaymentMethod,
        _target_currency: &CurrencyType,
        limits_currency: &CurrencyType,
    ) -> NetworkResult<TransactionLimits> {
        self.calls.limits.fetch_add(1, Ordering::SeqCst);
        self.check(BackendOperation::Limits)?;
        let configured = self.read().limits.get(&payment_method.id).cloned();
        let Some(limits) = configured else {
            return Ok(TransactionLimits::unbounded(limits_currency.clone()));
        };
        Ok(TransactionLimits {
            currency: limits_currency.clone(),
            minimum: self.convert_bound(&limits.minimum, limits_currency)?,
            maximum: self.convert_bound(&limits.maximum, limits_currency)?,
            maximum_daily: self.convert_bound(&limits.maximum_daily, limits_currency)?,
            maximum_annual: self.convert_bound(&limits.maximum_annual, limits_currency)?,
        })
    }
}

#[async_trait]
impl OrderQuoteService for InMemoryBackend {
    async fn get_quote(
        &self,
        _profile: QuoteProfile,
        from: &CurrencyType,
        to: &CurrencyType,
        amount: &MoneyValue,
    ) -> NetworkResult<Quote> {
        self.calls.quotes.fetch_add(1, Ordering::SeqCst);
        self.check(BackendOperation::Quote)?;
        let fiat_amount = self.convert_value(amount, from)?;
        let crypto_amount = self.convert_value(&fiat_amount, to)?;
        let price = self.price(to, from)?;
        Ok(Quote {
            estimated_fiat_amount: fiat_amount,
            estimated_crypto_amount: crypto_amount,
            fee: MoneyValue::zero(from.clone()),
            rate: ExchangeRate::new(to.clone(), MoneyValue::new(price, from.clone())),
        })
    }
}

#[async_trait]
impl OrderCreationService for InMemoryBackend {
    async fn create(&self, candidate: CandidateOrderDetails) -> NetworkResult<CheckoutData> {
        self.check(BackendOperation::CreateOrder)?;
        let fee = self.fee_for(candidate.payment_method, &candidate.fiat_value)?;
        let net = candidate.fiat_value.amount() - fee.amount();
        let net_fiat = MoneyValue::new(net.max(Decimal::ZERO), fee.currency().clone());
        let output_value = self.convert_value(&net_fiat, candidate.crypto_value.currency())?;

        let order = OrderDetails {
            identifier: Uuid::new_v4().to_string(),
            input_value: candidate.fiat_value,
            output_value,
            fee: Some(fee),
            payment_method: candidate.payment_method,
            state: OrderState::PendingConfirmation,
        };
        self.write()
            .orders
            .insert(order.identifier.clone(), order.clone());
        self.calls.orders_created.fetch_add(1, Ordering::SeqCst);
        Ok(CheckoutData::new(order))
    }
}

#[async_trait]
impl OrderConfirmationService for InMemoryBackend {
    async fn confirm(&self, checkout: CheckoutData) -> NetworkResult<CheckoutData> {
        self.check(BackendOperation::ConfirmOrder)?;
        let mut state = self.write();
        let order = state
            .orders
            .get_mut(&checkout.order.identifier)
            .ok_or_else(|| NetworkError::NotFound(checkout.order.identifier.clone()))?;
        if order.state != OrderState::PendingConfirmation {
            return Err(NetworkError::Server {
                status: 409,
                message: format!("order {} is {:?}", order.identifier, order.state),
            });
        }
        order.state = match order.payment_method {
            PaymentMethodType::BankTransfer => OrderState::PendingDeposit,
            PaymentMethodType::Card | PaymentMethodType::Funds => OrderState::Finished,
        };
        Ok(CheckoutData::new(order.clone()))
    }
}

#[async_trait]
impl OrderCancellationService for InMemoryBackend {
    async fn cancel_order(&self, identifier: &str) -> NetworkResult<()> {
        self.check(BackendOperation::CancelOrder)?;
        let mut state = self.write();
        let order = state
            .orders
            .get_mut(identifier)
            .ok_or_else(|| NetworkError::NotFound(identifier.to_string()))?;
        if order.state != OrderState::PendingConfirmation {
            return Err(NetworkError::Server {
                status: 409,
                message: format!("order {} is {:?}", order.identifier, order.state),
            });
        }
        order.state = OrderState::Cancelled;
        Ok(())
    }
}

#[async_trait]
impl BalanceService for InMemoryBackend {
    async fn balance(&self, payment_method: &PaymentMethod) -> NetworkResult<MoneyValue> {
        self.check(BackendOperation::Balance)?;
        self.read()
            .balances
            .get(&payment_method.id)
            .cloned()
            .ok_or_else(|| NetworkError::NotFound(format!("balance for {}", payment_method.id)))
    }
}
