use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use std::time::Instant;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use ledger_core::LedgerResult;
use tokio::sync::Mutex;
use tokio::sync::RwLock;

use crate::FxRate;
use crate::FxResolver;
use crate::IngestRateRequest;

const DEFAULT_TTL: StdDuration = StdDuration::from_secs(5 * 60);
/// Lookups more than this far from "now" are treated as historical and
/// bypass the cache entirely: the cache only ever holds the current rate
/// for a pair.
const HISTORICAL_SKEW: chrono::Duration = chrono::Duration::seconds(5);

struct Slot {
    value: Mutex<Option<(FxRate, Instant)>>,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }
}

/// Cache-aside, single-flight wrapper around an `FxResolver` (spec.md
/// §4.8). Concurrent lookups for the same `(base, quote)` serialize on
/// that pair's slot mutex rather than each issuing a redundant lookup
/// against the inner resolver, and `ingest` evicts the slot it affects.
pub struct CachingFxResolver {
    inner: Arc<dyn FxResolver>,
    ttl: StdDuration,
    slots: RwLock<HashMap<(String, String), Arc<Slot>>>,
}

impl CachingFxResolver {
    #[must_use]
    pub fn new(inner: Arc<dyn FxResolver>) -> Self {
        Self::with_ttl(inner, DEFAULT_TTL)
    }

    #[must_use]
    pub fn with_ttl(inner: Arc<dyn FxResolver>, ttl: StdDuration) -> Self {
        Self {
            inner,
            ttl,
            slots: RwLock::new(HashMap::new()),
        }
    }

    async fn slot_for(&self, key: &(String, String)) -> Arc<Slot> {
        if let Some(slot) = self.slots.read().await.get(key) {
            return slot.clone();
        }
        let mut slots = self.slots.write().await;
        slots.entry(key.clone()).or_default().clone()
    }
}

#[async_trait]
impl FxResolver for CachingFxResolver {
    async fn get_rate(
        &self,
        base: &str,
        quote: &str,
        as_of: DateTime<Utc>,
    ) -> LedgerResult<FxRate> {
        if (Utc::now() - as_of).abs() > HISTORICAL_SKEW {
            return self.inner.get_rate(base, quote, as_of).await;
        }

        let key = (base.to_string(), quote.to_string());
        let slot = self.slot_for(&key).await;
        let mut cached = slot.value.lock().await;

        if let Some((rate, fetched_at)) = cached.as_ref()
            && fetched_at.elapsed() < self.ttl
        {
            return Ok(rate.clone());
        }

        let rate = self.inner.get_rate(base, quote, as_of).await?;
        *cached = Some((rate.clone(), Instant::now()));
        Ok(rate)
    }

    async fn ingest(&self, request: IngestRateRequest) -> LedgerResult<FxRate> {
        let rate = self.inner.ingest(request).await?;
        let key = (rate.base.clone(), rate.quote.clone());
        if let Some(slot) = self.slots.read().await.get(&key) {
            *slot.value.lock().await = None;
        }
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryFxRateRegistry;
    use ledger_core::IdGenerator;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn resolver() -> CachingFxResolver {
        let inner: Arc<dyn FxResolver> =
            Arc::new(InMemoryFxRateRegistry::new(Arc::new(IdGenerator::new(1))));
        CachingFxResolver::new(inner)
    }

    async fn seed(resolver: &CachingFxResolver) {
        resolver
            .ingest(IngestRateRequest {
                base: "USD".into(),
                quote: "EUR".into(),
                rate: Decimal::new(90, 2),
                bid: None,
                ask: None,
                spread: None,
                valid_from: DateTime::UNIX_EPOCH,
                valid_to: None,
                source: "seed".into(),
            })
            .await
            .expect("seed rate");
    }

    #[tokio::test]
    async fn caches_current_rate_lookups() {
        let resolver = resolver();
        seed(&resolver).await;

        let first = resolver
            .get_rate("USD", "EUR", Utc::now())
            .await
            .expect("first lookup");
        let second = resolver
            .get_rate("USD", "EUR", Utc::now())
            .await
            .expect("second lookup hits cache");
        assert_eq!(first.rate, second.rate);
    }

    #[tokio::test]
    async fn ingest_busts_the_cache() {
        let resolver = resolver();
        seed(&resolver).await;
        resolver
            .get_rate("USD", "EUR", Utc::now())
            .await
            .expect("warm cache");

        resolver
            .ingest(IngestRateRequest {
                base: "USD".into(),
                quote: "EUR".into(),
                rate: Decimal::new(95, 2),
                bid: None,
                ask: None,
                spread: None,
                valid_from: Utc::now(),
                valid_to: None,
                source: "refresh".into(),
            })
            .await
            .expect("ingest new rate");

        let refreshed = resolver
            .get_rate("USD", "EUR", Utc::now())
            .await
            .expect("lookup after bust");
        assert_eq!(refreshed.rate, Decimal::new(95, 2));
    }

    #[tokio::test]
    async fn historical_lookups_bypass_cache() {
        let resolver = resolver();
        seed(&resolver).await;

        let historical = resolver
            .get_rate("USD", "EUR", DateTime::UNIX_EPOCH + chrono::Duration::hours(1))
            .await
            .expect("historical lookup");
        assert_eq!(historical.rate, Decimal::new(90, 2));
    }
}
