pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lookup;
pub mod registry;
pub mod routing;
pub mod rules;

pub use audit::{AuditLogger, InMemoryAuditLogger, LoggingFailure};
pub use domain::lead::{LeadAttributes, LeadRequest};
pub use domain::rep::{SalesRepId, SalesRepSummary, SalesRepresentative};
pub use domain::routing_log::{
    AllocationSnapshot, MatchedCriteria, RoutingLogEntry, RoutingLogId, RoutingMethod,
};
pub use domain::rule::{AllocationId, PercentageAllocation, RoutingRule, RoutingRuleId, RuleScope};
pub use errors::{ErrorCode, ErrorEnvelope, RoutingError, StoreError};
pub use lookup::{LeadLookup, LookedUpLead, LookupError, StaticLeadLookup};
pub use registry::{InMemoryRepRegistry, RepRegistry};
pub use routing::{
    DrawSource, RoutingEngine, RoutingOutcome, RoutingSettings, RoutingStats, StatsWindow,
};
pub use rules::{InMemoryRuleStore, RuleStore};
