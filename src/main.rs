use buyflow::application::engine::{BuyServices, BuyTransactionEngine};
use buyflow::domain::limits::{TransactionLimits, ValidationState};
use buyflow::domain::money::{CurrencyType, MoneyValue};
use buyflow::domain::order::{PaymentMethod, PaymentMethodAccount, PaymentMethodType};
use buyflow::error::BuyError;
use buyflow::infrastructure::in_memory::InMemoryBackend;
use buyflow::interfaces::csv::rate_reader::RateReader;
use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use serde_json::json;
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
    /// Build and validate the pending transaction only
    Quote,
    /// Create and confirm an order
    Buy,
    /// Create an order and cancel it
    Cancel,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Exchange rates CSV file (crypto,fiat,price)
    rates: PathBuf,

    /// Amount to spend, in fiat unless --amount-in-crypto is set
    #[arg(long)]
    amount: Decimal,

    /// Interpret --amount as crypto instead of fiat
    #[arg(long)]
    amount_in_crypto: bool,

    /// Crypto currency to buy
    #[arg(long, env = "BUYFLOW_CRYPTO", default_value = "BTC")]
    crypto: String,

    /// Fiat currency of the payment method and wallet
    #[arg(long, env = "BUYFLOW_FIAT", default_value = "USD")]
    fiat: String,

    /// Payment method type: card, bank_transfer or funds
    #[arg(long, env = "BUYFLOW_PAYMENT_METHOD", default_value = "card")]
    payment_method: PaymentMethodType,

    /// Balance available on the payment method
    #[arg(long, default_value = "0")]
    balance: Decimal,

    /// Minimum amount per transaction, in fiat
    #[arg(long)]
    min: Option<Decimal>,

    /// Maximum amount per transaction, in fiat
    #[arg(long)]
    max: Option<Decimal>,

    /// Maximum amount per day, in fiat
    #[arg(long)]
    max_daily: Option<Decimal>,

    /// Fee charged by the payment method, in basis points
    #[arg(long, env = "BUYFLOW_FEE_BPS", default_value_t = 0)]
    fee_bps: u32,

    /// How long fetched limits stay cached, in seconds
    #[arg(long, env = "BUYFLOW_LIMITS_TTL_SECS", default_value_t = 60)]
    limits_ttl_secs: u64,

    #[arg(long, value_enum, default_value_t = Action::Quote)]
    action: Action,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,buyflow=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_backend(cli: &Cli) -> Result<InMemoryBackend> {
    let backend = InMemoryBackend::new();

    let file = File::open(&cli.rates).into_diagnostic()?;
    for rate in RateReader::new(file).rates() {
        match rate {
            Ok(rate) => {
                let (crypto, fiat) = rate.currencies();
                backend.set_rate(crypto, fiat, rate.price);
            }
            Err(e) => warn!(error = %e, "skipping rate"),
        }
    }

    let fiat = CurrencyType::fiat(&cli.fiat);
    let bound = |value: Option<Decimal>| value.map(|v| MoneyValue::new(v, fiat.clone()));
    backend.set_limits(
        "primary",
        TransactionLimits {
            currency: fiat.clone(),
            minimum: bound(cli.min),
            maximum: bound(cli.max),
            maximum_daily: bound(cli.max_daily),
            maximum_annual: None,
        },
    );
    backend.set_balance("primary", MoneyValue::new(cli.balance, fiat.clone()));
    backend.set_fee_bps(cli.payment_method, cli.fee_bps);
    Ok(backend)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let backend = load_backend(&cli)?;
    let fiat = CurrencyType::fiat(&cli.fiat);
    let crypto = CurrencyType::crypto(&cli.crypto);

    let source = PaymentMethodAccount {
        label: format!("{} ({})", cli.payment_method, fiat),
        payment_method: PaymentMethod {
            id: "primary".to_string(),
            kind: cli.payment_method,
            fiat_currency: fiat.clone(),
        },
    };
    let services = BuyServices::from_backend(&backend)
        .with_limits_cache(Duration::from_secs(cli.limits_ttl_secs));
    let engine =
        BuyTransactionEngine::new(source, crypto.clone(), fiat.clone(), services).into_diagnostic()?;

    let amount = if cli.amount_in_crypto {
        MoneyValue::new(cli.amount, crypto)
    } else {
        MoneyValue::new(cli.amount, fiat)
    };
    let pending = engine.update(amount).await.into_diagnostic()?;
    let pending = engine.validate_all(pending).into_diagnostic()?;

    let output = match cli.action {
        Action::Quote => json!({ "pending": pending }),
        Action::Buy | Action::Cancel if pending.validation_state != ValidationState::CanExecute => {
            return Err(BuyError::ValidationFailure(pending.validation_state)).into_diagnostic();
        }
        Action::Buy => {
            let pending = engine.build_confirmations(pending).await.into_diagnostic()?;
            let result = engine.confirm_pending_order(&pending).await.into_diagnostic()?;
            json!({ "pending": pending, "result": result })
        }
        Action::Cancel => {
            let pending = engine.build_confirmations(pending).await.into_diagnostic()?;
            let order = engine.create_order(&pending).await.into_diagnostic()?;
            engine.cancel_order(&order.identifier).await.into_diagnostic()?;
            let lifecycle = engine.lifecycle().await;
            json!({
                "pending": pending,
                "cancelled": order.identifier,
                "lifecycle": lifecycle,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
    Ok(())
}
