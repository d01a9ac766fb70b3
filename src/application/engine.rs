use crate::application::limits_cache::CachingLimitsService;
use crate::domain::limits::{TransactionLimits, ValidationState};
use crate::domain::money::{CurrencyType, MoneyValue};
use crate::domain::order::{
    CandidateOrderDetails, CheckoutData, OrderDetails, OrderLifecycle, PaymentMethodAccount,
};
use crate::domain::ports::{
    BalanceService, BalanceServiceBox, CurrencyConversionService, CurrencyConversionServiceBox,
    OrderCancellationService, OrderCancellationServiceBox, OrderConfirmationService,
    OrderConfirmationServiceBox, OrderCreationService, OrderCreationServiceBox, OrderQuoteService,
    OrderQuoteServiceBox, TransactionLimitsService, TransactionLimitsServiceBox,
};
use crate::domain::quote::{ExchangeRate, ExchangeRatePairs, Quote, QuoteProfile};
use crate::domain::transaction::{
    FeeLevel, FeeSelection, PendingTransaction, TransactionConfirmation, TransactionResult,
};
use crate::error::{BuyError, Result};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// The backend collaborators a [`BuyTransactionEngine`] needs.
pub struct BuyServices {
    pub currency_conversion: CurrencyConversionServiceBox,
    pub limits: TransactionLimitsServiceBox,
    pub quotes: OrderQuoteServiceBox,
    pub order_creation: OrderCreationServiceBox,
    pub order_confirmation: OrderConfirmationServiceBox,
    pub order_cancellation: OrderCancellationServiceBox,
    pub balance: BalanceServiceBox,
}

impl BuyServices {
    /// Wires every port to clones of a single backend.
    pub fn from_backend<B>(backend: &B) -> Self
    where
        B: CurrencyConversionService
            + TransactionLimitsService
            + OrderQuoteService
            + OrderCreationService
            + OrderConfirmationService
            + OrderCancellationService
            + BalanceService
            + Clone
            + 'static,
    {
        Self {
            currency_conversion: Box::new(backend.clone()),
            limits: Box::new(backend.clone()),
            quotes: Box::new(backend.clone()),
            order_creation: Box::new(backend.clone()),
            order_confirmation: Box::new(backend.clone()),
            order_cancellation: Box::new(backend.clone()),
            balance: Box::new(backend.clone()),
        }
    }

    /// Puts a time-to-live cache in front of the limits service.
    pub fn with_limits_cache(mut self, ttl: Duration) -> Self {
        self.limits = Box::new(CachingLimitsService::new(self.limits, ttl));
        self
    }
}

#[derive(Default)]
struct Session {
    checkout: Option<CheckoutData>,
    lifecycle: OrderLifecycle,
}

/// Drives a single buy flow: paying from a fiat payment method to receive crypto.
///
/// The engine rebuilds a [`PendingTransaction`] on every amount change, validates it
/// against the payment method's limits, and walks the backend order through
/// creation, confirmation or cancellation. At most one created order is cached per
/// engine; asking for an order while one is cached returns it unchanged.
pub struct BuyTransactionEngine {
    source: PaymentMethodAccount,
    target: CurrencyType,
    wallet_currency: CurrencyType,
    services: BuyServices,
    session: RwLock<Session>,
}

impl BuyTransactionEngine {
    /// Creates a new `BuyTransactionEngine`.
    ///
    /// # Arguments
    ///
    /// * `source` - The fiat payment method the user pays with.
    /// * `target` - The crypto currency being bought.
    /// * `wallet_currency` - The user's display fiat currency, used for rates.
    /// * `services` - Backend collaborators.
    ///
    /// Fails with `OptionInvalid` when the source is not fiat or the target is not crypto.
    pub fn new(
        source: PaymentMethodAccount,
        target: CurrencyType,
        wallet_currency: CurrencyType,
        services: BuyServices,
    ) -> Result<Self> {
        if !source.fiat_currency().is_fiat() || target.is_fiat() || !wallet_currency.is_fiat() {
            return Err(BuyError::ValidationFailure(ValidationState::OptionInvalid));
        }
        Ok(Self {
            source,
            target,
            wallet_currency,
            services,
            session: RwLock::new(Session::default()),
        })
    }

    /// The payment method the user pays with.
    pub fn source(&self) -> &PaymentMethodAccount {
        &self.source
    }

    /// The crypto currency being bought.
    pub fn target(&self) -> &CurrencyType {
        &self.target
    }

    /// Where the current order stands.
    pub async fn lifecycle(&self) -> OrderLifecycle {
        self.session.read().await.lifecycle
    }

    /// The order created for this flow and not yet confirmed or cancelled, if any.
    pub async fn pending_checkout(&self) -> Option<CheckoutData> {
        self.session.read().await.checkout.clone()
    }

    /// Current price of one unit of the target crypto in the wallet currency.
    pub async fn transaction_exchange_rate(&self) -> Result<ExchangeRate> {
        let quote = self
            .services
            .currency_conversion
            .conversion_rate(&self.target, &self.wallet_currency)
            .await
            .map_err(BuyError::Price)?;
        Ok(ExchangeRate::new(self.target.clone(), quote))
    }

    /// The crypto-to-fiat rate together with its inverse.
    pub async fn fiat_exchange_rate_pairs(&self) -> Result<ExchangeRatePairs> {
        ExchangeRatePairs::from_rate(self.transaction_exchange_rate().await?)
    }

    /// Starts the flow with a zero amount in the payment method's currency.
    pub async fn initialize_transaction(&self) -> Result<PendingTransaction> {
        self.make_transaction(None).await
    }

    /// Rebuilds the pending transaction for a new amount.
    ///
    /// Fees stay at zero here; the real fee is only known once an order exists.
    pub async fn update(&self, amount: MoneyValue) -> Result<PendingTransaction> {
        self.make_transaction(Some(amount)).await
    }

    /// Sets the validation state from the amount and the transaction limits.
    pub fn validate_amount(&self, pending: PendingTransaction) -> Result<PendingTransaction> {
        let state = pending.limits.validate(&pending.amount)?;
        Ok(pending.with_validation_state(state))
    }

    /// Full validation before confirmation. Buys support no fee level other than
    /// `FeeLevel::None`; any other selection is `OptionInvalid`.
    pub fn validate_all(&self, pending: PendingTransaction) -> Result<PendingTransaction> {
        if pending.fee_selection.selected_level != FeeLevel::None {
            return Ok(pending.with_validation_state(ValidationState::OptionInvalid));
        }
        self.validate_amount(pending)
    }

    /// Always fails: fees are fixed for buying crypto.
    pub fn update_fee_level(
        &self,
        _pending: PendingTransaction,
        _level: FeeLevel,
        _custom_fee_amount: Option<MoneyValue>,
    ) -> Result<PendingTransaction> {
        Err(BuyError::FeeLevelNotSupported)
    }

    /// Returns the cached order, or quotes and creates a new one.
    pub async fn create_order(&self, pending: &PendingTransaction) -> Result<OrderDetails> {
        let mut session = self.session.write().await;
        if let Some(checkout) = &session.checkout {
            debug!(order = %checkout.order.identifier, "reusing pending order");
            return Ok(checkout.order.clone());
        }
        if session.lifecycle.is_terminal() {
            debug!(state = ?session.lifecycle, "starting a new order");
        }

        let quote = match self.fetch_quote(&pending.amount).await {
            Ok(quote) => quote,
            Err(e) => {
                error!(error = %e, "[BUY] Quote failed");
                session.lifecycle = OrderLifecycle::Failed;
                return Err(e);
            }
        };
        session.lifecycle = OrderLifecycle::Quoted;

        let candidate = CandidateOrderDetails::buy(
            self.source.payment_method.kind,
            quote.estimated_fiat_amount,
            quote.estimated_crypto_amount,
            self.source.order_payment_method_id(),
        );
        match self.services.order_creation.create(candidate).await {
            Ok(checkout) => {
                info!(order = %checkout.order.identifier, "[BUY] Order creation successful");
                let order = checkout.order.clone();
                session.checkout = Some(checkout);
                session.lifecycle = OrderLifecycle::OrderCreated;
                Ok(order)
            }
            Err(e) => {
                error!(error = %e, "[BUY] Order creation failed");
                session.lifecycle = OrderLifecycle::Failed;
                Err(e.into())
            }
        }
    }

    /// Creates (or reuses) the order and attaches the lines shown before execution.
    pub async fn build_confirmations(
        &self,
        pending: PendingTransaction,
    ) -> Result<PendingTransaction> {
        let order = self.create_order(&pending).await?;
        let pairs = self.fiat_exchange_rate_pairs().await?;

        let (fiat_amount, crypto_amount) =
            if order.input_value.is_fiat() && !order.output_value.is_fiat() {
                (order.input_value.clone(), order.output_value.clone())
            } else if pending.amount.is_fiat() {
                (
                    pending.amount.clone(),
                    pending.amount.convert(&pairs.destination)?,
                )
            } else {
                (
                    pending.amount.convert(&pairs.source)?,
                    pending.amount.clone(),
                )
            };

        let fee = order
            .fee
            .clone()
            .unwrap_or_else(|| MoneyValue::zero(fiat_amount.currency().clone()));

        let confirmations = vec![
            TransactionConfirmation::BuyCryptoValue {
                value: crypto_amount,
            },
            TransactionConfirmation::BuyExchangeRateValue {
                rate: pairs.source.quote.clone(),
                base_code: pairs.source.base.currency().code().to_string(),
            },
            TransactionConfirmation::BuyPaymentMethod {
                name: self.source.label.clone(),
            },
            TransactionConfirmation::TransactionFee { fee: fee.clone() },
            TransactionConfirmation::Total {
                total: order.input_value.clone(),
            },
        ];

        let mut pending = pending.with_confirmations(confirmations);
        if fee.currency() == pending.amount.currency() {
            pending.fee_amount = fee;
        }
        Ok(pending)
    }

    /// Confirms `order` with the backend.
    ///
    /// `order` must be the order currently cached for this flow. A missing or stale
    /// order fails with `OptionInvalid` and leaves the session untouched. Once the
    /// backend answers, the cached checkout data is cleared whatever the outcome.
    pub async fn execute(
        &self,
        pending: &PendingTransaction,
        order: Option<&OrderDetails>,
    ) -> Result<TransactionResult> {
        let Some(order) = order else {
            return Err(BuyError::ValidationFailure(ValidationState::OptionInvalid));
        };

        let mut session = self.session.write().await;
        let is_pending = session
            .checkout
            .as_ref()
            .is_some_and(|checkout| checkout.order.identifier == order.identifier);
        if !is_pending {
            warn!(order = %order.identifier, "[BUY] Order is not the pending order");
            return Err(BuyError::ValidationFailure(ValidationState::OptionInvalid));
        }

        let confirmed = self
            .services
            .order_confirmation
            .confirm(CheckoutData::new(order.clone()))
            .await;

        session.checkout = None;
        match confirmed {
            Ok(checkout) => {
                info!(order = %checkout.order.identifier, "[BUY] Order confirmation successful");
                session.lifecycle = OrderLifecycle::Confirmed;
                Ok(TransactionResult::Hashed {
                    tx_hash: checkout.order.identifier.clone(),
                    amount: pending.amount.clone(),
                    order: checkout.order,
                })
            }
            Err(e) => {
                error!(error = %e, "[BUY] Order confirmation failed");
                session.lifecycle = OrderLifecycle::Failed;
                Err(e.into())
            }
        }
    }

    /// Confirms whatever order is currently cached.
    pub async fn confirm_pending_order(
        &self,
        pending: &PendingTransaction,
    ) -> Result<TransactionResult> {
        let order = self.pending_checkout().await.map(|checkout| checkout.order);
        self.execute(pending, order.as_ref()).await
    }

    /// Cancels an order with the backend and forgets the cached checkout data.
    ///
    /// When the backend refuses, the cached order is kept.
    pub async fn cancel_order(&self, identifier: &str) -> Result<()> {
        match self
            .services
            .order_cancellation
            .cancel_order(identifier)
            .await
        {
            Ok(()) => {
                info!(order = identifier, "[BUY] Order cancelled");
                let mut session = self.session.write().await;
                session.checkout = None;
                session.lifecycle = OrderLifecycle::Cancelled;
                Ok(())
            }
            Err(e) => {
                error!(order = identifier, error = %e, "[BUY] Order cancellation failed");
                Err(e.into())
            }
        }
    }

    async fn make_transaction(&self, amount: Option<MoneyValue>) -> Result<PendingTransaction> {
        let amount =
            amount.unwrap_or_else(|| MoneyValue::zero(self.source.fiat_currency().clone()));
        let currency = amount.currency().clone();

        let (available, limits) = tokio::try_join!(
            self.convert_source_balance(&currency),
            self.transaction_limits(&currency)
        )?;

        let zero_fee = MoneyValue::zero(currency.clone());
        Ok(PendingTransaction {
            amount,
            available,
            fee_amount: zero_fee.clone(),
            fee_for_full_available: zero_fee,
            fee_selection: FeeSelection::empty(currency),
            selected_fiat_currency: self.source.fiat_currency().clone(),
            limits,
            validation_state: ValidationState::Uninitialized,
            confirmations: Vec::new(),
        })
    }

    async fn fetch_quote(&self, amount: &MoneyValue) -> Result<Quote> {
        let fiat_value = self.convert_amount_into_wallet_fiat(amount).await?;
        let quote = self
            .services
            .quotes
            .get_quote(
                QuoteProfile::SimpleBuy,
                self.source.fiat_currency(),
                &self.target,
                &fiat_value,
            )
            .await?;
        Ok(quote)
    }

    async fn convert_amount_into_wallet_fiat(&self, amount: &MoneyValue) -> Result<MoneyValue> {
        if amount.is_fiat() {
            return Ok(amount.clone());
        }
        let pairs = self.fiat_exchange_rate_pairs().await?;
        amount.convert(&pairs.source)
    }

    async fn convert_source_balance(&self, currency: &CurrencyType) -> Result<MoneyValue> {
        let balance = match self
            .services
            .balance
            .balance(&self.source.payment_method)
            .await
        {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "balance unavailable, assuming zero");
                return Ok(MoneyValue::zero(currency.clone()));
            }
        };
        self.services
            .currency_conversion
            .convert(&balance, currency)
            .await
            .map_err(BuyError::Price)
    }

    async fn transaction_limits(&self, currency: &CurrencyType) -> Result<TransactionLimits> {
        self.services
            .limits
            .fetch_limits(&self.source.payment_method, &self.target, currency)
            .await
            .map_err(BuyError::Limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderState, PaymentMethod, PaymentMethodType};
    use crate::error::NetworkError;
    use crate::infrastructure::in_memory::{BackendOperation, InMemoryBackend};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn usd() -> CurrencyType {
        CurrencyType::fiat("USD")
    }

    fn btc() -> CurrencyType {
        CurrencyType::crypto("BTC")
    }

    fn dollars(amount: Decimal) -> MoneyValue {
        MoneyValue::new(amount, usd())
    }

    fn account(kind: PaymentMethodType) -> PaymentMethodAccount {
        PaymentMethodAccount {
            label: "Visa 4242".to_string(),
            payment_method: PaymentMethod {
                id: "card-1".to_string(),
                kind,
                fiat_currency: usd(),
            },
        }
    }

    fn backend() -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        backend.set_rate(btc(), usd(), dec!(50000));
        backend.set_balance("card-1", dollars(dec!(500)));
        backend.set_fee_bps(PaymentMethodType::Card, 100);
        backend.set_limits(
            "card-1",
            TransactionLimits {
                currency: usd(),
                minimum: Some(dollars(dec!(10))),
                maximum: Some(dollars(dec!(1000))),
                maximum_daily: None,
                maximum_annual: None,
            },
        );
        backend
    }

    fn engine(backend: &InMemoryBackend) -> BuyTransactionEngine {
        BuyTransactionEngine::new(
            account(PaymentMethodType::Card),
            btc(),
            usd(),
            BuyServices::from_backend(backend),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_fiat_target() {
        let result = BuyTransactionEngine::new(
            account(PaymentMethodType::Card),
            CurrencyType::fiat("EUR"),
            usd(),
            BuyServices::from_backend(&backend()),
        );
        assert!(matches!(
            result,
            Err(BuyError::ValidationFailure(ValidationState::OptionInvalid))
        ));
    }

    #[tokio::test]
    async fn test_initialize_transaction_starts_at_zero() {
        let backend = backend();
        let engine = engine(&backend);

        let pending = engine.initialize_transaction().await.unwrap();
        assert_eq!(pending.amount, MoneyValue::zero(usd()));
        assert_eq!(pending.available, dollars(dec!(500)));
        assert_eq!(pending.fee_amount, MoneyValue::zero(usd()));
        assert_eq!(pending.validation_state, ValidationState::Uninitialized);
        assert_eq!(pending.limits.minimum, Some(dollars(dec!(10))));
    }

    #[tokio::test]
    async fn test_update_and_validate() {
        let backend = backend();
        let engine = engine(&backend);

        let pending = engine.update(dollars(dec!(5))).await.unwrap();
        let pending = engine.validate_amount(pending).unwrap();
        assert_eq!(pending.validation_state, ValidationState::BelowMinimumLimit);

        let pending = engine.update(dollars(dec!(100))).await.unwrap();
        let pending = engine.validate_all(pending).unwrap();
        assert_eq!(pending.validation_state, ValidationState::CanExecute);

        let pending = engine.update(dollars(dec!(1500))).await.unwrap();
        let pending = engine.validate_amount(pending).unwrap();
        assert_eq!(pending.validation_state, ValidationState::OverMaximumLimit);
    }

    #[tokio::test]
    async fn test_balance_failure_defaults_to_zero() {
        let backend = backend();
        backend.fail(
            BackendOperation::Balance,
            NetworkError::Connection("offline".to_string()),
        );
        let engine = engine(&backend);

        let pending = engine.update(dollars(dec!(20))).await.unwrap();
        assert_eq!(pending.available, MoneyValue::zero(usd()));
    }

    #[tokio::test]
    async fn test_limits_failure_surfaces_limits_error() {
        let backend = backend();
        backend.fail(
            BackendOperation::Limits,
            NetworkError::Server {
                status: 503,
                message: "unavailable".to_string(),
            },
        );
        let engine = engine(&backend);

        let result = engine.update(dollars(dec!(20))).await;
        assert!(matches!(result, Err(BuyError::Limits(_))));
    }

    #[tokio::test]
    async fn test_price_failure_surfaces_price_error() {
        let backend = backend();
        backend.fail(
            BackendOperation::ConversionRate,
            NetworkError::Connection("reset".to_string()),
        );
        let engine = engine(&backend);

        assert!(matches!(
            engine.update(dollars(dec!(20))).await,
            Err(BuyError::Price(_))
        ));
        assert!(matches!(
            engine.fiat_exchange_rate_pairs().await,
            Err(BuyError::Price(_))
        ));
    }

    #[tokio::test]
    async fn test_create_order_caches_checkout() {
        let backend = backend();
        let engine = engine(&backend);
        let pending = engine.update(dollars(dec!(100))).await.unwrap();

        let first = engine.create_order(&pending).await.unwrap();
        let second = engine.create_order(&pending).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.orders_created(), 1);
        assert_eq!(backend.quote_calls(), 1);
        assert_eq!(engine.lifecycle().await, OrderLifecycle::OrderCreated);
    }

    #[tokio::test]
    async fn test_crypto_amount_is_quoted_in_fiat() {
        let backend = backend();
        let engine = engine(&backend);
        let amount = MoneyValue::new(dec!(0.002), btc());
        let pending = engine.update(amount).await.unwrap();

        let order = engine.create_order(&pending).await.unwrap();
        assert_eq!(order.input_value, dollars(dec!(100)));
    }

    #[tokio::test]
    async fn test_oversized_crypto_amount_fails_without_order() {
        let backend = backend();
        let engine = engine(&backend);
        let amount = MoneyValue::new(Decimal::MAX / dec!(10), btc());
        let pending = engine.update(amount).await.unwrap();

        let result = engine.create_order(&pending).await;
        assert!(matches!(result, Err(BuyError::AmountOverflow(_))));
        assert_eq!(engine.lifecycle().await, OrderLifecycle::Failed);
        assert_eq!(backend.orders_created(), 0);
    }

    #[tokio::test]
    async fn test_build_confirmations_uses_order_values() {
        let backend = backend();
        let engine = engine(&backend);
        let pending = engine.update(dollars(dec!(100))).await.unwrap();

        let pending = engine.build_confirmations(pending).await.unwrap();
        assert_eq!(
            pending.confirmations,
            vec![
                TransactionConfirmation::BuyCryptoValue {
                    value: MoneyValue::new(dec!(0.00198), btc()),
                },
                TransactionConfirmation::BuyExchangeRateValue {
                    rate: dollars(dec!(50000)),
                    base_code: "BTC".to_string(),
                },
                TransactionConfirmation::BuyPaymentMethod {
                    name: "Visa 4242".to_string(),
                },
                TransactionConfirmation::TransactionFee {
                    fee: dollars(dec!(1)),
                },
                TransactionConfirmation::Total {
                    total: dollars(dec!(100)),
                },
            ]
        );
        assert_eq!(pending.fee_amount, dollars(dec!(1)));
    }

    #[tokio::test]
    async fn test_execute_confirms_and_clears_checkout() {
        let backend = backend();
        let engine = engine(&backend);
        let pending = engine.update(dollars(dec!(100))).await.unwrap();
        let order = engine.create_order(&pending).await.unwrap();

        let result = engine.execute(&pending, Some(&order)).await.unwrap();
        assert_eq!(result.tx_hash(), order.identifier);
        assert!(engine.pending_checkout().await.is_none());
        assert_eq!(engine.lifecycle().await, OrderLifecycle::Confirmed);
        assert_eq!(
            backend.order(&order.identifier).unwrap().state,
            OrderState::Finished
        );
    }

    #[tokio::test]
    async fn test_execute_without_order_is_option_invalid() {
        let backend = backend();
        let engine = engine(&backend);
        let pending = engine.update(dollars(dec!(100))).await.unwrap();

        let result = engine.execute(&pending, None).await;
        assert!(matches!(
            result,
            Err(BuyError::ValidationFailure(ValidationState::OptionInvalid))
        ));

        let result = engine.confirm_pending_order(&pending).await;
        assert!(matches!(
            result,
            Err(BuyError::ValidationFailure(ValidationState::OptionInvalid))
        ));
    }

    #[tokio::test]
    async fn test_execute_stale_order_keeps_pending_order() {
        let backend = backend();
        let engine = engine(&backend);
        let pending = engine.update(dollars(dec!(100))).await.unwrap();

        let stale = engine.create_order(&pending).await.unwrap();
        engine.cancel_order(&stale.identifier).await.unwrap();
        let live = engine.create_order(&pending).await.unwrap();

        let result = engine.execute(&pending, Some(&stale)).await;
        assert!(matches!(
            result,
            Err(BuyError::ValidationFailure(ValidationState::OptionInvalid))
        ));
        assert_eq!(
            engine.pending_checkout().await.map(|c| c.order.identifier),
            Some(live.identifier.clone())
        );
        assert_eq!(engine.lifecycle().await, OrderLifecycle::OrderCreated);
        assert_eq!(
            backend.order(&live.identifier).unwrap().state,
            OrderState::PendingConfirmation
        );

        let result = engine.execute(&pending, Some(&live)).await.unwrap();
        assert_eq!(result.tx_hash(), live.identifier);
        assert_eq!(engine.lifecycle().await, OrderLifecycle::Confirmed);
        assert_eq!(
            backend.order(&stale.identifier).unwrap().state,
            OrderState::Cancelled
        );
    }

    #[tokio::test]
    async fn test_execute_without_cached_order_is_option_invalid() {
        let backend = backend();
        let engine = engine(&backend);
        let pending = engine.update(dollars(dec!(100))).await.unwrap();
        let order = engine.create_order(&pending).await.unwrap();
        engine.execute(&pending, Some(&order)).await.unwrap();

        assert!(matches!(
            engine.execute(&pending, Some(&order)).await,
            Err(BuyError::ValidationFailure(ValidationState::OptionInvalid))
        ));
        assert_eq!(engine.lifecycle().await, OrderLifecycle::Confirmed);
    }

    #[tokio::test]
    async fn test_confirmation_failure_is_reported() {
        let backend = backend();
        let engine = engine(&backend);
        let pending = engine.update(dollars(dec!(100))).await.unwrap();
        engine.create_order(&pending).await.unwrap();

        backend.fail(
            BackendOperation::ConfirmOrder,
            NetworkError::Server {
                status: 402,
                message: "card declined".to_string(),
            },
        );
        let result = engine.confirm_pending_order(&pending).await;
        assert!(matches!(
            result,
            Err(BuyError::Network(NetworkError::Server { status: 402, .. }))
        ));
        assert_eq!(engine.lifecycle().await, OrderLifecycle::Failed);
        assert!(engine.pending_checkout().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_clears_checkout() {
        let backend = backend();
        let engine = engine(&backend);
        let pending = engine.update(dollars(dec!(100))).await.unwrap();
        let order = engine.create_order(&pending).await.unwrap();
        assert!(engine.pending_checkout().await.is_some());

        engine.cancel_order(&order.identifier).await.unwrap();
        assert!(engine.pending_checkout().await.is_none());
        assert_eq!(engine.lifecycle().await, OrderLifecycle::Cancelled);
        assert_eq!(
            backend.order(&order.identifier).unwrap().state,
            OrderState::Cancelled
        );
    }

    #[tokio::test]
    async fn test_creation_failure_leaves_no_checkout() {
        let backend = backend();
        backend.fail(
            BackendOperation::CreateOrder,
            NetworkError::Server {
                status: 500,
                message: "boom".to_string(),
            },
        );
        let engine = engine(&backend);
        let pending = engine.update(dollars(dec!(100))).await.unwrap();

        assert!(matches!(
            engine.create_order(&pending).await,
            Err(BuyError::Network(_))
        ));
        assert!(engine.pending_checkout().await.is_none());
        assert_eq!(engine.lifecycle().await, OrderLifecycle::Failed);
    }

    #[tokio::test]
    async fn test_fee_level_cannot_change() {
        let backend = backend();
        let engine = engine(&backend);
        let pending = engine.initialize_transaction().await.unwrap();
        assert!(matches!(
            engine.update_fee_level(pending, FeeLevel::Priority, None),
            Err(BuyError::FeeLevelNotSupported)
        ));
    }
}
