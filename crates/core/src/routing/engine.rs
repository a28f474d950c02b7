use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::audit::AuditLogger;
use crate::domain::lead::{LeadAttributes, LeadRequest};
use crate::domain::normalize_optional;
use crate::domain::rep::{SalesRepId, SalesRepresentative};
use crate::domain::routing_log::{
    AllocationSnapshot, MatchedCriteria, RoutingLogEntry, RoutingLogId, RoutingMethod,
};
use crate::domain::rule::{PercentageAllocation, RoutingRule, RuleScope};
use crate::errors::RoutingError;
use crate::lookup::LeadLookup;
use crate::registry::RepRegistry;
use crate::routing::selection::{select_weighted, total_weight, DrawSource, ThreadRngDraw};
use crate::rules::RuleStore;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingSettings {
    pub lookup_timeout: Duration,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self { lookup_timeout: DEFAULT_LOOKUP_TIMEOUT }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoutingOutcome {
    pub sales_rep: SalesRepresentative,
    pub method: RoutingMethod,
    pub criteria: MatchedCriteria,
    /// Attributes the decision was made with, after lookup enrichment.
    pub lead: LeadAttributes,
    pub log_entry_id: RoutingLogId,
    pub audit_recorded: bool,
}

struct Resolution {
    rep: SalesRepresentative,
    criteria: MatchedCriteria,
}

/// Assigns a lead to exactly one representative.
///
/// Stages run in strict order: source rules, city rules, then weighted
/// percentage allocations. Each stage only considers representatives the
/// registry reports as active. The engine holds no per-decision state and is
/// safe to share across tasks.
pub struct RoutingEngine {
    registry: Arc<dyn RepRegistry>,
    rules: Arc<dyn RuleStore>,
    audit: Arc<dyn AuditLogger>,
    lookup: Option<Arc<dyn LeadLookup>>,
    draw: Arc<dyn DrawSource>,
    settings: RoutingSettings,
    audit_failures: AtomicU64,
}

impl RoutingEngine {
    pub fn new(
        registry: Arc<dyn RepRegistry>,
        rules: Arc<dyn RuleStore>,
        audit: Arc<dyn AuditLogger>,
    ) -> Self {
        Self {
            registry,
            rules,
            audit,
            lookup: None,
            draw: Arc::new(ThreadRngDraw),
            settings: RoutingSettings::default(),
            audit_failures: AtomicU64::new(0),
        }
    }

    pub fn with_lead_lookup(mut self, lookup: Arc<dyn LeadLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn with_draw_source(mut self, draw: Arc<dyn DrawSource>) -> Self {
        self.draw = draw;
        self
    }

    pub fn with_settings(mut self, settings: RoutingSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Number of decisions whose routing log write failed since startup.
    pub fn audit_failures(&self) -> u64 {
        self.audit_failures.load(Ordering::Relaxed)
    }

    pub async fn route(&self, request: &LeadRequest) -> Result<RoutingOutcome, RoutingError> {
        let mut lead = request.normalize();
        if lead.lead_source.is_none() {
            self.enrich_from_lookup(&mut lead).await;
        }

        let resolution = match self.source_stage(&lead).await? {
            Some(resolution) => resolution,
            None => match self.city_stage(&lead).await? {
                Some(resolution) => resolution,
                None => self.percentage_stage().await?,
            },
        };

        let method = resolution.criteria.method();
        let entry = RoutingLogEntry::new(
            lead.clone(),
            resolution.rep.id.clone(),
            resolution.criteria.clone(),
        );
        let log_entry_id = entry.id.clone();
        let audit_recorded = self.record(entry).await;

        info!(
            event_name = "routing.decision.resolved",
            routing_method = method.as_str(),
            sales_rep_id = %resolution.rep.id,
            log_entry_id = %log_entry_id.0,
            audit_recorded,
            "lead routed"
        );

        Ok(RoutingOutcome {
            sales_rep: resolution.rep,
            method,
            criteria: resolution.criteria,
            lead,
            log_entry_id,
            audit_recorded,
        })
    }

    /// Fills missing source/status from the lead lookup. Every failure mode,
    /// including timeout, leaves the lead untouched.
    async fn enrich_from_lookup(&self, lead: &mut LeadAttributes) {
        let Some(lookup) = &self.lookup else {
            return;
        };
        let Some(email) = lead.lookup_email().map(str::to_owned) else {
            if lead.email.is_some() {
                debug!(
                    event_name = "routing.lookup.skipped_malformed_email",
                    "email is not an address, skipping lead lookup"
                );
            }
            return;
        };

        match tokio::time::timeout(self.settings.lookup_timeout, lookup.find_by_email(&email)).await
        {
            Ok(Ok(Some(found))) => {
                lead.lead_source = normalize_optional(found.lead_source.as_deref());
                if lead.lead_status.is_none() {
                    lead.lead_status = normalize_optional(found.lead_status.as_deref());
                }
                debug!(
                    event_name = "routing.lookup.found",
                    lead_source = lead.lead_source.as_deref().unwrap_or("unknown"),
                    lead_status = lead.lead_status.as_deref().unwrap_or("unknown"),
                    "lead attributes enriched from lookup"
                );
            }
            Ok(Ok(None)) => {
                debug!(event_name = "routing.lookup.not_found", "no lead record for email");
            }
            Ok(Err(error)) => {
                warn!(
                    event_name = "routing.lookup.failed",
                    error = %error,
                    "lead lookup failed, skipping source-derived matching"
                );
            }
            Err(_) => {
                warn!(
                    event_name = "routing.lookup.timeout",
                    timeout_ms = self.settings.lookup_timeout.as_millis() as u64,
                    "lead lookup timed out, skipping source-derived matching"
                );
            }
        }
    }

    async fn source_stage(
        &self,
        lead: &LeadAttributes,
    ) -> Result<Option<Resolution>, RoutingError> {
        let Some(source) = lead.lead_source.as_deref() else {
            return Ok(None);
        };

        let matched =
            self.match_scope(RuleScope::Source, source, lead.lead_status.as_deref()).await?;
        Ok(matched.map(|(rule, rep)| Resolution {
            rep,
            criteria: MatchedCriteria::Source {
                rule_id: rule.id,
                lead_source: source.to_string(),
                lead_status: rule.status,
            },
        }))
    }

    async fn city_stage(&self, lead: &LeadAttributes) -> Result<Option<Resolution>, RoutingError> {
        let Some(city) = lead.city.as_deref() else {
            return Ok(None);
        };

        let matched = self.match_scope(RuleScope::City, city, lead.lead_status.as_deref()).await?;
        Ok(matched.map(|(rule, rep)| Resolution {
            rep,
            criteria: MatchedCriteria::City {
                rule_id: rule.id,
                city: city.to_string(),
                lead_status: rule.status,
            },
        }))
    }

    /// Two-pass lookup within one scope: rules with the lead's exact status
    /// first, then rules without a status filter. The status pass is skipped
    /// when the lead carries no status.
    async fn match_scope(
        &self,
        scope: RuleScope,
        value: &str,
        status: Option<&str>,
    ) -> Result<Option<(RoutingRule, SalesRepresentative)>, RoutingError> {
        if let Some(status) = status {
            if let Some(matched) = self.first_eligible_rule(scope, value, Some(status)).await? {
                return Ok(Some(matched));
            }
        }

        self.first_eligible_rule(scope, value, None).await
    }

    async fn first_eligible_rule(
        &self,
        scope: RuleScope,
        value: &str,
        status: Option<&str>,
    ) -> Result<Option<(RoutingRule, SalesRepresentative)>, RoutingError> {
        let rules = self.rules.find_active_rules(scope, value, status).await?;
        for rule in rules {
            if !self.registry.is_active(&rule.sales_rep_id).await? {
                debug!(
                    event_name = "routing.rule.skipped_inactive_rep",
                    scope = scope.as_str(),
                    rule_id = %rule.id.0,
                    sales_rep_id = %rule.sales_rep_id,
                    "rule targets an inactive representative"
                );
                continue;
            }

            let rep = self.load_active_rep(&rule.sales_rep_id).await?;
            return Ok(Some((rule, rep)));
        }

        Ok(None)
    }

    async fn percentage_stage(&self) -> Result<Resolution, RoutingError> {
        let allocations = self.rules.list_active_percentage_allocations().await?;

        let mut eligible: Vec<PercentageAllocation> = Vec::with_capacity(allocations.len());
        for allocation in allocations {
            if !self.registry.is_active(&allocation.sales_rep_id).await? {
                continue;
            }
            // Only rows that could be drawn are validated.
            if !allocation.percentage.is_finite() || allocation.percentage < 0.0 {
                return Err(RoutingError::Configuration(format!(
                    "allocation `{}` has invalid percentage {}",
                    allocation.id.0, allocation.percentage
                )));
            }
            if allocation.percentage > 0.0 {
                eligible.push(allocation);
            }
        }

        let total = total_weight(&eligible);
        if eligible.is_empty() || total <= 0.0 {
            warn!(
                event_name = "routing.percentage.exhausted",
                "no active percentage allocation with an active representative"
            );
            return Err(RoutingError::NoEligibleRepresentative);
        }

        let random_value = self.draw.draw(total);
        let pick =
            select_weighted(&eligible, random_value).ok_or(RoutingError::NoEligibleRepresentative)?;
        if pick.fallback {
            warn!(
                event_name = "routing.percentage.fallback_last",
                random_value,
                total,
                "draw exceeded cumulative weight, selecting last allocation"
            );
        }

        let rep = self.load_active_rep(&pick.allocation.sales_rep_id).await?;
        let criteria = MatchedCriteria::Percentage {
            random_value,
            total,
            cumulative: pick.cumulative,
            fallback: pick.fallback,
            allocations: eligible.iter().map(AllocationSnapshot::from).collect(),
        };

        Ok(Resolution { rep, criteria })
    }

    async fn load_active_rep(&self, id: &SalesRepId) -> Result<SalesRepresentative, RoutingError> {
        self.registry.find_rep(id).await?.ok_or_else(|| {
            RoutingError::Configuration(format!(
                "representative `{id}` is marked active but could not be loaded"
            ))
        })
    }

    /// Writes the routing log entry. Failure is counted and warned, never returned.
    async fn record(&self, entry: RoutingLogEntry) -> bool {
        let log_entry_id = entry.id.0.clone();
        match self.audit.record(entry).await {
            Ok(()) => true,
            Err(failure) => {
                let failures = self.audit_failures.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    event_name = "routing.audit.write_failed",
                    log_entry_id = %log_entry_id,
                    audit_failures = failures,
                    error = %failure,
                    "routing decision was not recorded"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};

    use super::{RoutingEngine, RoutingSettings};
    use crate::audit::InMemoryAuditLogger;
    use crate::domain::lead::LeadRequest;
    use crate::domain::rep::{SalesRepId, SalesRepresentative};
    use crate::domain::routing_log::{MatchedCriteria, RoutingMethod};
    use crate::domain::rule::{PercentageAllocation, RoutingRule, RuleScope};
    use crate::errors::{RoutingError, StoreError};
    use crate::lookup::{LeadLookup, LookedUpLead, LookupError, StaticLeadLookup};
    use crate::registry::InMemoryRepRegistry;
    use crate::routing::selection::{FixedDraw, SeededDraw};
    use crate::rules::{InMemoryRuleStore, RuleStore};

    struct Harness {
        registry: Arc<InMemoryRepRegistry>,
        audit: InMemoryAuditLogger,
        engine: RoutingEngine,
    }

    fn rep(id: &str) -> SalesRepresentative {
        SalesRepresentative {
            id: SalesRepId(id.to_string()),
            name: format!("Rep {id}"),
            email: format!("{id}@example.com"),
            active: true,
            calendar_id: None,
        }
    }

    fn rep_id(id: &str) -> SalesRepId {
        SalesRepId(id.to_string())
    }

    fn harness(
        reps: &[&str],
        rules: Vec<RoutingRule>,
        allocations: Vec<PercentageAllocation>,
    ) -> Harness {
        let registry =
            Arc::new(InMemoryRepRegistry::with_reps(reps.iter().map(|id| rep(id)).collect()));
        let audit = InMemoryAuditLogger::default();
        let engine = RoutingEngine::new(
            registry.clone(),
            Arc::new(InMemoryRuleStore::new(rules, allocations)),
            Arc::new(audit.clone()),
        );
        Harness { registry, audit, engine }
    }

    fn lead(city: Option<&str>, source: Option<&str>, status: Option<&str>) -> LeadRequest {
        LeadRequest {
            email: Some("jane@example.com".to_string()),
            city: city.map(str::to_string),
            lead_source: source.map(str::to_string),
            lead_status: status.map(str::to_string),
        }
    }

    fn split(a: f64, b: f64) -> Vec<PercentageAllocation> {
        let now = Utc::now();
        vec![
            PercentageAllocation::new(
                "alloc-a",
                rep_id("rep-a"),
                a,
                now - ChronoDuration::minutes(1),
            ),
            PercentageAllocation::new("alloc-b", rep_id("rep-b"), b, now),
        ]
    }

    #[tokio::test]
    async fn source_rule_wins_over_matching_city_rule() {
        let now = Utc::now();
        let harness = harness(
            &["rep-s", "rep-c"],
            vec![
                RoutingRule::new(
                    "r-city",
                    RuleScope::City,
                    "austin",
                    Some("new"),
                    rep_id("rep-c"),
                    now,
                ),
                RoutingRule::new(
                    "r-src",
                    RuleScope::Source,
                    "web",
                    Some("new"),
                    rep_id("rep-s"),
                    now,
                ),
            ],
            Vec::new(),
        );

        let outcome = harness
            .engine
            .route(&lead(Some("Austin"), Some("Web"), Some("New")))
            .await
            .expect("route");

        assert_eq!(outcome.sales_rep.id.0, "rep-s");
        assert_eq!(outcome.method, RoutingMethod::Source);
        match outcome.criteria {
            MatchedCriteria::Source { rule_id, lead_source, lead_status } => {
                assert_eq!(rule_id.0, "r-src");
                assert_eq!(lead_source, "web");
                assert_eq!(lead_status.as_deref(), Some("new"));
            }
            other => panic!("unexpected criteria {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_exact_rule_precedes_null_status_rule() {
        let now = Utc::now();
        let harness = harness(
            &["rep-null", "rep-exact"],
            vec![
                RoutingRule::new(
                    "r-null",
                    RuleScope::Source,
                    "web",
                    None,
                    rep_id("rep-null"),
                    now - ChronoDuration::hours(1),
                ),
                RoutingRule::new(
                    "r-exact",
                    RuleScope::Source,
                    "web",
                    Some("qualified"),
                    rep_id("rep-exact"),
                    now,
                ),
            ],
            Vec::new(),
        );

        let exact =
            harness.engine.route(&lead(None, Some("web"), Some("Qualified"))).await.expect("route");
        assert_eq!(exact.sales_rep.id.0, "rep-exact");

        let other_status =
            harness.engine.route(&lead(None, Some("web"), Some("new"))).await.expect("route");
        assert_eq!(other_status.sales_rep.id.0, "rep-null");

        let no_status = harness.engine.route(&lead(None, Some("web"), None)).await.expect("route");
        assert_eq!(no_status.sales_rep.id.0, "rep-null");
    }

    #[tokio::test]
    async fn city_stage_resolves_when_no_source_rule_matches() {
        let now = Utc::now();
        let harness = harness(
            &["rep-x", "rep-a", "rep-b"],
            vec![
                RoutingRule::new(
                    "r-src",
                    RuleScope::Source,
                    "referral",
                    None,
                    rep_id("rep-a"),
                    now,
                ),
                RoutingRule::new("r-city", RuleScope::City, "austin", None, rep_id("rep-x"), now),
            ],
            split(50.0, 50.0),
        );

        let outcome = harness
            .engine
            .route(&lead(Some("austin"), Some("web"), Some("new")))
            .await
            .expect("route");

        assert_eq!(outcome.method, RoutingMethod::City);
        assert_eq!(outcome.sales_rep.id.0, "rep-x");
    }

    #[tokio::test]
    async fn city_rule_with_status_routes_austin_lead_to_rep_x() {
        let now = Utc::now();
        let harness = harness(
            &["rep-x", "rep-a", "rep-b"],
            vec![RoutingRule::new(
                "r-austin-new",
                RuleScope::City,
                "austin",
                Some("new"),
                rep_id("rep-x"),
                now,
            )],
            split(30.0, 70.0),
        );

        let outcome = harness
            .engine
            .route(&LeadRequest {
                city: Some("austin".to_string()),
                lead_status: Some("new".to_string()),
                ..LeadRequest::default()
            })
            .await
            .expect("route");

        assert_eq!(outcome.sales_rep.id.0, "rep-x");
        assert_eq!(outcome.method, RoutingMethod::City);
    }

    #[tokio::test]
    async fn percentage_draw_of_55_selects_second_allocation() {
        let harness = harness(&["rep-a", "rep-b"], Vec::new(), split(40.0, 60.0));
        let engine = harness.engine.with_draw_source(Arc::new(FixedDraw(55.0)));

        let outcome = engine.route(&lead(Some("dallas"), None, None)).await.expect("route");

        assert_eq!(outcome.method, RoutingMethod::Percentage);
        assert_eq!(outcome.sales_rep.id.0, "rep-b");
        match outcome.criteria {
            MatchedCriteria::Percentage {
                random_value,
                total,
                cumulative,
                fallback,
                allocations,
            } => {
                assert_eq!(random_value, 55.0);
                assert_eq!(total, 100.0);
                assert_eq!(cumulative, 100.0);
                assert!(!fallback);
                assert_eq!(allocations.len(), 2);
            }
            other => panic!("unexpected criteria {other:?}"),
        }
    }

    #[tokio::test]
    async fn draw_past_total_takes_last_allocation_as_fallback() {
        let harness = harness(&["rep-a", "rep-b"], Vec::new(), split(0.1, 0.2));
        let engine = harness.engine.with_draw_source(Arc::new(FixedDraw(1.0)));

        let outcome = engine.route(&LeadRequest::default()).await.expect("route");

        assert_eq!(outcome.sales_rep.id.0, "rep-b");
        assert!(matches!(outcome.criteria, MatchedCriteria::Percentage { fallback: true, .. }));
    }

    #[tokio::test]
    async fn empty_rules_and_allocations_fail_with_no_eligible_representative() {
        let harness = harness(&["rep-a"], Vec::new(), Vec::new());

        let error = harness
            .engine
            .route(&lead(Some("austin"), Some("web"), None))
            .await
            .expect_err("no rep");

        assert_eq!(error, RoutingError::NoEligibleRepresentative);
        assert!(harness.audit.entries().is_empty());
    }

    #[tokio::test]
    async fn zero_sum_allocations_fail_with_no_eligible_representative() {
        let harness = harness(&["rep-a", "rep-b"], Vec::new(), split(0.0, 0.0));

        let error = harness.engine.route(&LeadRequest::default()).await.expect_err("zero sum");
        assert_eq!(error, RoutingError::NoEligibleRepresentative);
    }

    #[tokio::test]
    async fn negative_percentage_is_a_configuration_error() {
        let harness = harness(&["rep-a", "rep-b"], Vec::new(), split(-10.0, 60.0));

        let error = harness.engine.route(&LeadRequest::default()).await.expect_err("negative");
        assert!(matches!(error, RoutingError::Configuration(_)));
    }

    #[tokio::test]
    async fn thirty_seventy_split_is_respected_over_many_trials() {
        let harness = harness(&["rep-a", "rep-b"], Vec::new(), split(30.0, 70.0));
        let engine = harness.engine.with_draw_source(Arc::new(SeededDraw::new(20_240_601)));

        let trials = 10_000;
        let mut rep_a = 0;
        for _ in 0..trials {
            let outcome = engine.route(&LeadRequest::default()).await.expect("route");
            if outcome.sales_rep.id.0 == "rep-a" {
                rep_a += 1;
            }
        }

        let share = f64::from(rep_a) / f64::from(trials);
        assert!((0.27..=0.33).contains(&share), "rep-a share was {share}");
    }

    #[tokio::test]
    async fn proportions_hold_when_weights_do_not_sum_to_one_hundred() {
        let harness = harness(&["rep-a", "rep-b"], Vec::new(), split(4.0, 6.0));
        let engine = harness.engine.with_draw_source(Arc::new(SeededDraw::new(99)));

        let trials = 10_000;
        let mut rep_a = 0;
        for _ in 0..trials {
            let outcome = engine.route(&LeadRequest::default()).await.expect("always selects");
            match outcome.criteria {
                MatchedCriteria::Percentage { total, random_value, .. } => {
                    assert_eq!(total, 10.0);
                    assert!((0.0..10.0).contains(&random_value));
                }
                other => panic!("unexpected criteria {other:?}"),
            }
            if outcome.sales_rep.id.0 == "rep-a" {
                rep_a += 1;
            }
        }

        let share = f64::from(rep_a) / f64::from(trials);
        assert!((0.37..=0.43).contains(&share), "rep-a share was {share}");
    }

    #[tokio::test]
    async fn deactivated_rep_loses_rule_and_percentage_eligibility() {
        let now = Utc::now();
        let harness = harness(
            &["rep-a", "rep-b"],
            vec![RoutingRule::new("r-city", RuleScope::City, "austin", None, rep_id("rep-b"), now)],
            split(40.0, 60.0),
        );
        let engine = harness.engine.with_draw_source(Arc::new(FixedDraw(99.0)));

        let before = engine.route(&lead(Some("austin"), None, None)).await.expect("route");
        assert_eq!(before.sales_rep.id.0, "rep-b");
        assert_eq!(before.method, RoutingMethod::City);

        assert!(harness.registry.set_active(&rep_id("rep-b"), false).await);

        let after = engine.route(&lead(Some("austin"), None, None)).await.expect("route");
        assert_eq!(after.method, RoutingMethod::Percentage);
        assert_eq!(after.sales_rep.id.0, "rep-a");
        match after.criteria {
            MatchedCriteria::Percentage { total, allocations, .. } => {
                assert_eq!(total, 40.0);
                assert_eq!(allocations.len(), 1);
            }
            other => panic!("unexpected criteria {other:?}"),
        }
    }

    #[tokio::test]
    async fn every_success_writes_exactly_one_matching_log_entry() {
        let now = Utc::now();
        let harness = harness(
            &["rep-x", "rep-a", "rep-b"],
            vec![RoutingRule::new("r-city", RuleScope::City, "austin", None, rep_id("rep-x"), now)],
            split(40.0, 60.0),
        );

        let outcomes = vec![
            harness.engine.route(&lead(Some("austin"), None, None)).await.expect("route"),
            harness.engine.route(&lead(Some("dallas"), None, Some("new"))).await.expect("route"),
        ];

        let entries = harness.audit.entries();
        assert_eq!(entries.len(), outcomes.len());
        for (entry, outcome) in entries.iter().zip(&outcomes) {
            assert_eq!(entry.id, outcome.log_entry_id);
            assert_eq!(entry.method, outcome.method);
            assert_eq!(entry.sales_rep_id, outcome.sales_rep.id);
            assert!(outcome.audit_recorded);
        }
        assert_eq!(entries[0].random_value(), None);
        assert!(entries[1].random_value().is_some());
        assert_eq!(entries[1].considered_allocations().len(), 2);
        assert_eq!(entries[1].lead.city.as_deref(), Some("dallas"));
    }

    #[tokio::test]
    async fn audit_failure_is_counted_but_not_returned() {
        let harness = harness(&["rep-a", "rep-b"], Vec::new(), split(40.0, 60.0));
        harness.audit.reject_writes(true);

        let outcome =
            harness.engine.route(&LeadRequest::default()).await.expect("route still succeeds");

        assert!(!outcome.audit_recorded);
        assert_eq!(harness.engine.audit_failures(), 1);
        assert!(harness.audit.entries().is_empty());
    }

    #[tokio::test]
    async fn looked_up_source_enables_source_stage() {
        let now = Utc::now();
        let harness = harness(
            &["rep-s", "rep-c"],
            vec![
                RoutingRule::new(
                    "r-src",
                    RuleScope::Source,
                    "partner",
                    Some("working"),
                    rep_id("rep-s"),
                    now,
                ),
                RoutingRule::new("r-city", RuleScope::City, "austin", None, rep_id("rep-c"), now),
            ],
            Vec::new(),
        );
        let lookup = StaticLeadLookup::default().with_lead(
            "jane@example.com",
            LookedUpLead {
                lead_source: Some("Partner".to_string()),
                lead_status: Some("Working".to_string()),
            },
        );
        let engine = harness.engine.with_lead_lookup(Arc::new(lookup));

        let outcome = engine.route(&lead(Some("austin"), None, None)).await.expect("route");

        assert_eq!(outcome.method, RoutingMethod::Source);
        assert_eq!(outcome.sales_rep.id.0, "rep-s");
        assert_eq!(outcome.lead.lead_source.as_deref(), Some("partner"));
        assert_eq!(outcome.lead.lead_status.as_deref(), Some("working"));
    }

    #[tokio::test]
    async fn request_status_takes_precedence_over_looked_up_status() {
        let now = Utc::now();
        let harness = harness(
            &["rep-new", "rep-working"],
            vec![
                RoutingRule::new(
                    "r-new",
                    RuleScope::Source,
                    "partner",
                    Some("new"),
                    rep_id("rep-new"),
                    now,
                ),
                RoutingRule::new(
                    "r-working",
                    RuleScope::Source,
                    "partner",
                    Some("working"),
                    rep_id("rep-working"),
                    now,
                ),
            ],
            Vec::new(),
        );
        let lookup = StaticLeadLookup::default().with_lead(
            "jane@example.com",
            LookedUpLead {
                lead_source: Some("partner".to_string()),
                lead_status: Some("working".to_string()),
            },
        );
        let engine = harness.engine.with_lead_lookup(Arc::new(lookup));

        let outcome = engine.route(&lead(None, None, Some("new"))).await.expect("route");
        assert_eq!(outcome.sales_rep.id.0, "rep-new");
    }

    struct FailingLookup;

    #[async_trait]
    impl LeadLookup for FailingLookup {
        async fn find_by_email(&self, _email: &str) -> Result<Option<LookedUpLead>, LookupError> {
            Err(LookupError::Transport("connection refused".to_string()))
        }
    }

    struct SlowLookup;

    #[async_trait]
    impl LeadLookup for SlowLookup {
        async fn find_by_email(&self, _email: &str) -> Result<Option<LookedUpLead>, LookupError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some(LookedUpLead { lead_source: Some("web".to_string()), lead_status: None }))
        }
    }

    #[tokio::test]
    async fn failed_lookup_falls_through_to_city_stage() {
        let now = Utc::now();
        let harness = harness(
            &["rep-c"],
            vec![RoutingRule::new("r-city", RuleScope::City, "austin", None, rep_id("rep-c"), now)],
            Vec::new(),
        );
        let engine = harness.engine.with_lead_lookup(Arc::new(FailingLookup));

        let outcome = engine.route(&lead(Some("austin"), None, None)).await.expect("route");
        assert_eq!(outcome.method, RoutingMethod::City);
        assert_eq!(outcome.lead.lead_source, None);
    }

    #[tokio::test]
    async fn slow_lookup_is_bounded_by_timeout() {
        let now = Utc::now();
        let harness = harness(
            &["rep-s", "rep-c"],
            vec![
                RoutingRule::new("r-src", RuleScope::Source, "web", None, rep_id("rep-s"), now),
                RoutingRule::new("r-city", RuleScope::City, "austin", None, rep_id("rep-c"), now),
            ],
            Vec::new(),
        );
        let engine = harness
            .engine
            .with_lead_lookup(Arc::new(SlowLookup))
            .with_settings(RoutingSettings { lookup_timeout: Duration::from_millis(20) });

        let started = std::time::Instant::now();
        let outcome = engine.route(&lead(Some("austin"), None, None)).await.expect("route");

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(outcome.method, RoutingMethod::City);
        assert_eq!(outcome.sales_rep.id.0, "rep-c");
    }

    #[tokio::test]
    async fn rule_pointing_at_inactive_rep_is_skipped_for_next_duplicate() {
        let now = Utc::now();
        let harness = harness(
            &["rep-old", "rep-new"],
            vec![
                RoutingRule::new(
                    "r-first",
                    RuleScope::City,
                    "austin",
                    None,
                    rep_id("rep-old"),
                    now - ChronoDuration::days(1),
                ),
                RoutingRule::new(
                    "r-second",
                    RuleScope::City,
                    "austin",
                    None,
                    rep_id("rep-new"),
                    now,
                ),
            ],
            Vec::new(),
        );

        let first = harness.engine.route(&lead(Some("austin"), None, None)).await.expect("route");
        assert_eq!(first.sales_rep.id.0, "rep-old");

        harness.registry.set_active(&rep_id("rep-old"), false).await;
        let second = harness.engine.route(&lead(Some("austin"), None, None)).await.expect("route");
        assert_eq!(second.sales_rep.id.0, "rep-new");
    }

    struct UnavailableStore;

    #[async_trait]
    impl RuleStore for UnavailableStore {
        async fn find_active_rules(
            &self,
            _scope: RuleScope,
            _value: &str,
            _status: Option<&str>,
        ) -> Result<Vec<RoutingRule>, StoreError> {
            Err(StoreError::Unavailable("database is locked".to_string()))
        }

        async fn list_active_percentage_allocations(
            &self,
        ) -> Result<Vec<PercentageAllocation>, StoreError> {
            Err(StoreError::Unavailable("database is locked".to_string()))
        }
    }

    #[tokio::test]
    async fn store_failure_aborts_the_decision() {
        let engine = RoutingEngine::new(
            Arc::new(InMemoryRepRegistry::default()),
            Arc::new(UnavailableStore),
            Arc::new(InMemoryAuditLogger::default()),
        );

        let error = engine.route(&lead(Some("austin"), None, None)).await.expect_err("store down");
        assert!(matches!(error, RoutingError::Store(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn malformed_email_still_routes_by_percentage() {
        let now = Utc::now();
        let harness = harness(
            &["rep-a"],
            Vec::new(),
            vec![PercentageAllocation::new("alloc-a", rep_id("rep-a"), 100.0, now)],
        );
        let engine = harness
            .engine
            .with_lead_lookup(Arc::new(FailingLookup))
            .with_draw_source(Arc::new(FixedDraw(42.0)));

        let outcome = engine
            .route(&LeadRequest { email: Some("unknown".to_string()), ..LeadRequest::default() })
            .await
            .expect("malformed email is not a routing failure");

        assert_eq!(outcome.method, RoutingMethod::Percentage);
        assert_eq!(outcome.sales_rep.id.0, "rep-a");
        assert_eq!(outcome.lead.email.as_deref(), Some("unknown"));
        assert_eq!(harness.audit.entries().len(), 1);
    }

    #[tokio::test]
    async fn invalid_allocation_on_inactive_rep_does_not_block_selection() {
        let now = Utc::now();
        let harness = harness(
            &["rep-a", "rep-b"],
            Vec::new(),
            vec![
                PercentageAllocation::new("alloc-a", rep_id("rep-a"), 100.0, now),
                PercentageAllocation::new("alloc-b", rep_id("rep-b"), -5.0, now),
            ],
        );
        harness.registry.set_active(&rep_id("rep-b"), false).await;
        let engine = harness.engine.with_draw_source(Arc::new(FixedDraw(99.0)));

        let outcome = engine.route(&lead(None, None, None)).await.expect("route");

        assert_eq!(outcome.method, RoutingMethod::Percentage);
        assert_eq!(outcome.sales_rep.id.0, "rep-a");
    }

    #[tokio::test]
    async fn invalid_allocation_on_active_rep_is_a_configuration_error() {
        let now = Utc::now();
        let harness = harness(
            &["rep-a", "rep-b"],
            Vec::new(),
            vec![
                PercentageAllocation::new("alloc-a", rep_id("rep-a"), 100.0, now),
                PercentageAllocation::new("alloc-b", rep_id("rep-b"), f64::NAN, now),
            ],
        );

        let error = harness.engine.route(&lead(None, None, None)).await.expect_err("invalid");
        assert!(matches!(error, RoutingError::Configuration(_)));
    }
}
