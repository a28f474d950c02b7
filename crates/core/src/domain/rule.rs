use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::normalize_key;
use crate::domain::rep::SalesRepId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoutingRuleId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AllocationId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    Source,
    City,
}

impl RuleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::City => "city",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_key(raw).as_str() {
            "source" => Some(Self::Source),
            "city" => Some(Self::City),
            _ => None,
        }
    }
}

/// Admin-defined mapping from a scoped value (and optional status) to a representative.
///
/// `match_value` and `status` are stored in normalized form so that lookups are
/// case-insensitive on both sides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: RoutingRuleId,
    pub scope: RuleScope,
    pub match_value: String,
    pub status: Option<String>,
    pub sales_rep_id: SalesRepId,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl RoutingRule {
    pub fn new(
        id: impl Into<String>,
        scope: RuleScope,
        match_value: &str,
        status: Option<&str>,
        sales_rep_id: SalesRepId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RoutingRuleId(id.into()),
            scope,
            match_value: normalize_key(match_value),
            status: crate::domain::normalize_optional(status),
            sales_rep_id,
            active: true,
            created_at,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Exact-shape match: a `None` status only matches rules without a status filter.
    pub fn matches(&self, scope: RuleScope, value: &str, status: Option<&str>) -> bool {
        if self.scope != scope || self.match_value != normalize_key(value) {
            return false;
        }

        match (&self.status, status) {
            (Some(rule_status), Some(status)) => *rule_status == normalize_key(status),
            (None, None) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PercentageAllocation {
    pub id: AllocationId,
    pub sales_rep_id: SalesRepId,
    pub percentage: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl PercentageAllocation {
    pub fn new(
        id: impl Into<String>,
        sales_rep_id: SalesRepId,
        percentage: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self { id: AllocationId(id.into()), sales_rep_id, percentage, active: true, created_at }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{RoutingRule, RuleScope};
    use crate::domain::rep::SalesRepId;

    fn rule(status: Option<&str>) -> RoutingRule {
        RoutingRule::new(
            "rule-1",
            RuleScope::City,
            " Austin ",
            status,
            SalesRepId("rep-x".to_string()),
            Utc::now(),
        )
    }

    #[test]
    fn new_rule_normalizes_match_value_and_status() {
        let rule = rule(Some("New"));
        assert_eq!(rule.match_value, "austin");
        assert_eq!(rule.status.as_deref(), Some("new"));
    }

    #[test]
    fn status_rule_matches_only_the_same_status() {
        let rule = rule(Some("new"));
        assert!(rule.matches(RuleScope::City, "AUSTIN", Some("NEW")));
        assert!(!rule.matches(RuleScope::City, "austin", Some("qualified")));
        assert!(!rule.matches(RuleScope::City, "austin", None));
    }

    #[test]
    fn null_status_rule_is_not_an_any_status_wildcard() {
        let rule = rule(None);
        assert!(rule.matches(RuleScope::City, "austin", None));
        assert!(!rule.matches(RuleScope::City, "austin", Some("new")));
    }

    #[test]
    fn scope_must_match() {
        let rule = rule(None);
        assert!(!rule.matches(RuleScope::Source, "austin", None));
    }

    #[test]
    fn scope_parses_case_insensitively() {
        assert_eq!(RuleScope::parse("SOURCE"), Some(RuleScope::Source));
        assert_eq!(RuleScope::parse("city"), Some(RuleScope::City));
        assert_eq!(RuleScope::parse("region"), None);
    }
}
