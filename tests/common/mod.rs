#![allow(dead_code)]

use buyflow::application::engine::{BuyServices, BuyTransactionEngine};
use buyflow::domain::limits::TransactionLimits;
use buyflow::domain::money::{CurrencyType, MoneyValue};
use buyflow::domain::order::{PaymentMethod, PaymentMethodAccount, PaymentMethodType};
use buyflow::infrastructure::in_memory::InMemoryBackend;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::io::Error;
use std::path::Path;

pub const PAYMENT_METHOD_ID: &str = "card-1";

pub fn usd() -> CurrencyType {
    CurrencyType::fiat("USD")
}

pub fn btc() -> CurrencyType {
    CurrencyType::crypto("BTC")
}

pub fn dollars(amount: Decimal) -> MoneyValue {
    MoneyValue::new(amount, usd())
}

/// A backend quoting BTC at 40,000 USD with 10..=2,500 USD card limits.
pub fn backend() -> InMemoryBackend {
    let backend = InMemoryBackend::new();
    backend.set_rate(btc(), usd(), dec!(40000));
    backend.set_balance(PAYMENT_METHOD_ID, dollars(dec!(1000)));
    backend.set_fee_bps(PaymentMethodType::Card, 250);
    backend.set_limits(
        PAYMENT_METHOD_ID,
        TransactionLimits {
            currency: usd(),
            minimum: Some(dollars(dec!(10))),
            maximum: Some(dollars(dec!(2500))),
            maximum_daily: None,
            maximum_annual: None,
        },
    );
    backend
}

pub fn engine_with(backend: &InMemoryBackend, kind: PaymentMethodType) -> BuyTransactionEngine {
    let source = PaymentMethodAccount {
        label: "Primary card".to_string(),
        payment_method: PaymentMethod {
            id: PAYMENT_METHOD_ID.to_string(),
            kind,
            fiat_currency: usd(),
        },
    };
    BuyTransactionEngine::new(source, btc(), usd(), BuyServices::from_backend(backend))
        .expect("valid engine inputs")
}

pub fn engine(backend: &InMemoryBackend) -> BuyTransactionEngine {
    engine_with(backend, PaymentMethodType::Card)
}

pub fn write_rates(path: &Path, rows: &[(&str, &str, &str)]) -> Result<(), Error> {
    let mut wtr = csv::WriterBuilder::new().from_path(path)?;
    wtr.write_record(["crypto", "fiat", "price"])?;
    for (crypto, fiat, price) in rows {
        wtr.write_record([*crypto, *fiat, *price])?;
    }
    wtr.flush()?;
    Ok(())
}
