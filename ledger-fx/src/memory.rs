use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use ledger_core::IdGenerator;
use ledger_core::LedgerError;
use ledger_core::LedgerResult;
use tokio::sync::RwLock;

use crate::FxRate;
use crate::FxResolver;
use crate::IngestRateRequest;

/// Uncached FX rate storage: every rate ever ingested for `(base, quote)`,
/// selected at read time by "window covers `as_of`, newest
/// `valid_from` wins" rule. Wrap in `CachingFxResolver` for the short-TTL
/// cache spec.md also asks for.
pub struct InMemoryFxRateRegistry {
    ids: Arc<IdGenerator>,
    rates: RwLock<HashMap<(String, String), Vec<FxRate>>>,
}

impl InMemoryFxRateRegistry {
    #[must_use]
    pub fn new(ids: Arc<IdGenerator>) -> Self {
        Self {
            ids,
            rates: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl FxResolver for InMemoryFxRateRegistry {
    async fn get_rate(
        &self,
        base: &str,
        quote: &str,
        as_of: DateTime<Utc>,
    ) -> LedgerResult<FxRate> {
        let rates = self.rates.read().await;
        let key = (base.to_string(), quote.to_string());
        rates
            .get(&key)
            .and_then(|candidates| {
                candidates
                    .iter()
                    .filter(|rate| rate.valid_from <= as_of)
                    .filter(|rate| rate.valid_to.is_none_or(|valid_to| as_of < valid_to))
                    .max_by_key(|rate| rate.valid_from)
            })
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("no fx rate for {base}/{quote} as of {as_of}")))
    }

    async fn ingest(&self, request: IngestRateRequest) -> LedgerResult<FxRate> {
        let rate = FxRate {
            id: self.ids.next_id()?,
            base: request.base,
            quote: request.quote,
            rate: request.rate,
            bid: request.bid,
            ask: request.ask,
            spread: request.spread,
            valid_from: request.valid_from,
            valid_to: request.valid_to,
            source: request.source,
        };

        let mut rates = self.rates.write().await;
        rates
            .entry((rate.base.clone(), rate.quote.clone()))
            .or_default()
            .push(rate.clone());
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> InMemoryFxRateRegistry {
        InMemoryFxRateRegistry::new(Arc::new(IdGenerator::new(1)))
    }

    #[tokio::test]
    async fn newest_valid_from_wins_among_overlapping_windows() {
        let registry = registry();
        let older = DateTime::UNIX_EPOCH;
        let newer = older + chrono::Duration::days(1);

        registry
            .ingest(IngestRateRequest {
                base: "USD".into(),
                quote: "EUR".into(),
                rate: rust_decimal::Decimal::new(90, 2),
                bid: None,
                ask: None,
                spread: None,
                valid_from: older,
                valid_to: None,
                source: "seed".into(),
            })
            .await
            .expect("ingest older");
        registry
            .ingest(IngestRateRequest {
                base: "USD".into(),
                quote: "EUR".into(),
                rate: rust_decimal::Decimal::new(92, 2),
                bid: None,
                ask: None,
                spread: None,
                valid_from: newer,
                valid_to: None,
                source: "seed".into(),
            })
            .await
            .expect("ingest newer");

        let resolved = registry
            .get_rate("USD", "EUR", newer + chrono::Duration::hours(1))
            .await
            .expect("rate present");
        assert_eq!(resolved.rate, rust_decimal::Decimal::new(92, 2));
    }

    #[tokio::test]
    async fn missing_pair_is_not_found() {
        let registry = registry();
        let err = registry
            .get_rate("USD", "JPY", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }
}
