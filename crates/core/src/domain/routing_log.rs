use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::lead::LeadAttributes;
use crate::domain::rep::SalesRepId;
use crate::domain::rule::{AllocationId, PercentageAllocation, RoutingRuleId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingLogId(pub String);

impl RoutingLogId {
    pub fn generate() -> Self {
        Self(format!("RLOG-{}", Uuid::new_v4().simple()))
    }
}

/// Which cascade stage resolved a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMethod {
    Source,
    City,
    Percentage,
}

impl RoutingMethod {
    pub const ALL: [RoutingMethod; 3] = [Self::Source, Self::City, Self::Percentage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::City => "city",
            Self::Percentage => "percentage",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "source" => Some(Self::Source),
            "city" => Some(Self::City),
            "percentage" => Some(Self::Percentage),
            _ => None,
        }
    }
}

impl std::fmt::Display for RoutingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationSnapshot {
    pub allocation_id: AllocationId,
    pub sales_rep_id: SalesRepId,
    pub percentage: f64,
}

impl From<&PercentageAllocation> for AllocationSnapshot {
    fn from(allocation: &PercentageAllocation) -> Self {
        Self {
            allocation_id: allocation.id.clone(),
            sales_rep_id: allocation.sales_rep_id.clone(),
            percentage: allocation.percentage,
        }
    }
}

/// The evidence behind a decision. `lead_status` on rule-based variants is the
/// status filter of the matched rule; `None` means the null-status pass won.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum MatchedCriteria {
    Source {
        rule_id: RoutingRuleId,
        lead_source: String,
        lead_status: Option<String>,
    },
    City {
        rule_id: RoutingRuleId,
        city: String,
        lead_status: Option<String>,
    },
    Percentage {
        random_value: f64,
        total: f64,
        cumulative: f64,
        fallback: bool,
        allocations: Vec<AllocationSnapshot>,
    },
}

impl MatchedCriteria {
    pub fn method(&self) -> RoutingMethod {
        match self {
            Self::Source { .. } => RoutingMethod::Source,
            Self::City { .. } => RoutingMethod::City,
            Self::Percentage { .. } => RoutingMethod::Percentage,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingLogEntry {
    pub id: RoutingLogId,
    pub recorded_at: DateTime<Utc>,
    pub lead: LeadAttributes,
    pub method: RoutingMethod,
    pub sales_rep_id: SalesRepId,
    pub criteria: MatchedCriteria,
}

impl RoutingLogEntry {
    pub fn new(lead: LeadAttributes, sales_rep_id: SalesRepId, criteria: MatchedCriteria) -> Self {
        Self {
            id: RoutingLogId::generate(),
            recorded_at: Utc::now(),
            lead,
            method: criteria.method(),
            sales_rep_id,
            criteria,
        }
    }

    pub fn random_value(&self) -> Option<f64> {
        match &self.criteria {
            MatchedCriteria::Percentage { random_value, .. } => Some(*random_value),
            _ => None,
        }
    }

    pub fn considered_allocations(&self) -> &[AllocationSnapshot] {
        match &self.criteria {
            MatchedCriteria::Percentage { allocations, .. } => allocations,
            _ => &[],
        }
    }
}
