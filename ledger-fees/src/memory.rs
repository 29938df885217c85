use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use ledger_core::LedgerResult;
use tokio::sync::RwLock;

use crate::FeeRule;
use crate::FeeRuleId;
use crate::FeeRuleRegistry;

#[derive(Default)]
pub struct InMemoryFeeRuleRegistry {
    rules: RwLock<HashMap<FeeRuleId, FeeRule>>,
}

impl InMemoryFeeRuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeeRuleRegistry for InMemoryFeeRuleRegistry {
    async fn upsert(&self, rule: FeeRule) -> LedgerResult<FeeRule> {
        let mut rules = self.rules.write().await;
        rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn list_active(&self, transaction_type: &str) -> LedgerResult<Vec<FeeRule>> {
        let rules = self.rules.read().await;
        let now = Utc::now();
        let mut matched: Vec<FeeRule> = rules
            .values()
            .filter(|rule| rule.is_active)
            .filter(|rule| rule.transaction_type == transaction_type)
            .filter(|rule| rule.valid_from <= now)
            .filter(|rule| rule.valid_to.is_none_or(|valid_to| now < valid_to))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::AccountKind;
    use ledger_core::FeeType;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn rule(id: FeeRuleId, priority: i32) -> FeeRule {
        FeeRule {
            id,
            rule_name: "default".into(),
            transaction_type: "withdrawal".into(),
            source_currency: None,
            target_currency: None,
            account_kind: Some(AccountKind::Real),
            owner_type: None,
            fee_type: FeeType::Platform,
            calculation_method: crate::CalculationMethod::Fixed,
            fee_value: Decimal::from(100),
            min_fee: None,
            max_fee: None,
            tiers: Vec::new(),
            valid_from: chrono::DateTime::UNIX_EPOCH,
            valid_to: None,
            is_active: true,
            priority,
        }
    }

    #[tokio::test]
    async fn upserts_and_lists_active_rules_by_priority() {
        let registry = InMemoryFeeRuleRegistry::new();
        registry.upsert(rule(1, 5)).await.expect("upsert");
        registry.upsert(rule(2, 20)).await.expect("upsert");

        let rules = registry.list_active("withdrawal").await.expect("list");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].id, 2);
    }

    #[tokio::test]
    async fn inactive_rules_are_excluded() {
        let registry = InMemoryFeeRuleRegistry::new();
        let mut inactive = rule(1, 5);
        inactive.is_active = false;
        registry.upsert(inactive).await.expect("upsert");

        let rules = registry.list_active("withdrawal").await.expect("list");
        assert!(rules.is_empty());
    }
}
