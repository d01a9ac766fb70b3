mod common;

use buyflow::application::engine::{BuyServices, BuyTransactionEngine};
use buyflow::domain::money::MoneyValue;
use buyflow::domain::order::{PaymentMethod, PaymentMethodAccount, PaymentMethodType};
use buyflow::domain::ports::{BalanceServiceBox, CurrencyConversionServiceBox};
use common::{backend, btc, dollars, usd, PAYMENT_METHOD_ID};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_ports_as_trait_objects() {
    let backend = backend();
    let conversion: CurrencyConversionServiceBox = Box::new(backend.clone());
    let balances: BalanceServiceBox = Box::new(backend.clone());

    // Verify Send + Sync by spawning tasks
    let rate_handle = tokio::spawn(async move {
        conversion.conversion_rate(&btc(), &usd()).await.unwrap()
    });
    let balance_handle = tokio::spawn(async move {
        let method = PaymentMethod {
            id: PAYMENT_METHOD_ID.to_string(),
            kind: PaymentMethodType::Card,
            fiat_currency: usd(),
        };
        balances.balance(&method).await.unwrap()
    });

    assert_eq!(rate_handle.await.unwrap(), dollars(dec!(40000)));
    assert_eq!(balance_handle.await.unwrap(), dollars(dec!(1000)));
}

#[tokio::test]
async fn test_engine_shared_across_tasks_creates_one_order() {
    let backend = backend();
    let source = PaymentMethodAccount {
        label: "Primary card".to_string(),
        payment_method: PaymentMethod {
            id: PAYMENT_METHOD_ID.to_string(),
            kind: PaymentMethodType::Card,
            fiat_currency: usd(),
        },
    };
    let services = BuyServices::from_backend(&backend).with_limits_cache(Duration::from_secs(60));
    let engine = Arc::new(BuyTransactionEngine::new(source, btc(), usd(), services).unwrap());
    let pending = engine.update(dollars(dec!(75))).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        let pending = pending.clone();
        handles.push(tokio::spawn(async move {
            engine.create_order(&pending).await.unwrap().identifier
        }));
    }

    let mut identifiers = Vec::new();
    for handle in handles {
        identifiers.push(handle.await.unwrap());
    }
    identifiers.dedup();
    assert_eq!(identifiers.len(), 1);
    assert_eq!(backend.orders_created(), 1);
}

#[tokio::test]
async fn test_cached_limits_survive_repeated_updates() {
    let backend = backend();
    let source = PaymentMethodAccount {
        label: "Primary card".to_string(),
        payment_method: PaymentMethod {
            id: PAYMENT_METHOD_ID.to_string(),
            kind: PaymentMethodType::Card,
            fiat_currency: usd(),
        },
    };
    let services = BuyServices::from_backend(&backend).with_limits_cache(Duration::from_secs(60));
    let engine = BuyTransactionEngine::new(source, btc(), usd(), services).unwrap();

    for cents in [1_000, 2_000, 3_000] {
        let amount = MoneyValue::new(rust_decimal::Decimal::new(cents, 2), usd());
        engine.update(amount).await.unwrap();
    }
    assert_eq!(backend.limits_calls(), 1);
}
