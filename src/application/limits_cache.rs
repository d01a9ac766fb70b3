use crate::domain::limits::TransactionLimits;
use crate::domain::money::CurrencyType;
use crate::domain::order::PaymentMethod;
use crate::domain::ports::{NetworkResult, TransactionLimitsService, TransactionLimitsServiceBox};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_LIMITS_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LimitsKey {
    payment_method_id: String,
    target_currency: CurrencyType,
    limits_currency: CurrencyType,
}

struct CachedLimits {
    fetched_at: Instant,
    limits: TransactionLimits,
}

/// Keeps fetched limits around for a fixed time-to-live.
///
/// Entries are keyed by payment method, target currency and limits currency.
/// Expired entries are refetched on the next lookup; failed fetches are not cached.
pub struct CachingLimitsService {
    inner: TransactionLimitsServiceBox,
    ttl: Duration,
    entries: RwLock<HashMap<LimitsKey, CachedLimits>>,
}

impl CachingLimitsService {
    pub fn new(inner: TransactionLimitsServiceBox, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fetches limits, going to the network when `ignoring_cache` is set or no
    /// fresh entry exists.
    pub async fn fetch_limits_with(
        &self,
        payment_method: &PaymentMethod,
        target_currency: &CurrencyType,
        limits_currency: &CurrencyType,
        ignoring_cache: bool,
    ) -> NetworkResult<TransactionLimits> {
        let key = LimitsKey {
            payment_method_id: payment_method.id.clone(),
            target_currency: target_currency.clone(),
            limits_currency: limits_currency.clone(),
        };

        if !ignoring_cache {
            let entries = self.entries.read().await;
            if let Some(cached) = entries.get(&key)
                && cached.fetched_at.elapsed() < self.ttl
            {
                debug!(payment_method = %payment_method.id, "limits served from cache");
                return Ok(cached.limits.clone());
            }
        }

        let limits = self
            .inner
            .fetch_limits(payment_method, target_currency, limits_currency)
            .await?;
        self.entries.write().await.insert(
            key,
            CachedLimits {
                fetched_at: Instant::now(),
                limits: limits.clone(),
            },
        );
        Ok(limits)
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl TransactionLimitsService for CachingLimitsService {
    async fn fetch_limits(
        &self,
        payment_method: &PaymentMethod,
        target_currency: &CurrencyType,
        limits_currency: &CurrencyType,
    ) -> NetworkResult<TransactionLimits> {
        self.fetch_limits_with(payment_method, target_currency, limits_currency, false)
            .await
    }
}
