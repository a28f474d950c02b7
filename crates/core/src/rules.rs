use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::rule::{PercentageAllocation, RoutingRule, RuleScope};
use crate::errors::StoreError;

/// Read-only query surface over routing rules and percentage allocations.
///
/// Both queries return rows ordered by `(created_at, id)` so that duplicate
/// rules and the weighted walk resolve deterministically.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Active rules in `scope` matching `value`. `status = None` selects rules
    /// without a status filter only; it is not an "any status" query.
    async fn find_active_rules(
        &self,
        scope: RuleScope,
        value: &str,
        status: Option<&str>,
    ) -> Result<Vec<RoutingRule>, StoreError>;

    async fn list_active_percentage_allocations(
        &self,
    ) -> Result<Vec<PercentageAllocation>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryRuleStore {
    rules: RwLock<Vec<RoutingRule>>,
    allocations: RwLock<Vec<PercentageAllocation>>,
}

impl InMemoryRuleStore {
    pub fn new(rules: Vec<RoutingRule>, allocations: Vec<PercentageAllocation>) -> Self {
        Self { rules: RwLock::new(rules), allocations: RwLock::new(allocations) }
    }

    pub async fn add_rule(&self, rule: RoutingRule) {
        self.rules.write().await.push(rule);
    }

    pub async fn add_allocation(&self, allocation: PercentageAllocation) {
        self.allocations.write().await.push(allocation);
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn find_active_rules(
        &self,
        scope: RuleScope,
        value: &str,
        status: Option<&str>,
    ) -> Result<Vec<RoutingRule>, StoreError> {
        let mut matches: Vec<RoutingRule> = self
            .rules
            .read()
            .await
            .iter()
            .filter(|rule| rule.active && rule.matches(scope, value, status))
            .cloned()
            .collect();
        matches.sort_by(|left, right| {
            left.created_at.cmp(&right.created_at).then_with(|| left.id.cmp(&right.id))
        });
        Ok(matches)
    }

    async fn list_active_percentage_allocations(
        &self,
    ) -> Result<Vec<PercentageAllocation>, StoreError> {
        let mut allocations: Vec<PercentageAllocation> = self
            .allocations
            .read()
            .await
            .iter()
            .filter(|allocation| allocation.active)
            .cloned()
            .collect();
        allocations.sort_by(|left, right| {
            left.created_at.cmp(&right.created_at).then_with(|| left.id.cmp(&right.id))
        });
        Ok(allocations)
    }
}
