use std::collections::HashSet;

use leadroute_core::config::{AppConfig, LoadOptions};
use leadroute_core::rules::RuleStore;
use leadroute_db::{connect_with_config, ping, DbPool, SqlRepRegistry, SqlRuleStore};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["database_connectivity", "routing_readiness"] {
                checks.push(DoctorCheck::skipped(name, "configuration did not load"));
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped("routing_readiness", "the async runtime did not start"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped("routing_readiness", "the database is unreachable"),
                ];
            }
        };

        let connectivity = match ping(&pool).await {
            Ok(()) => DoctorCheck::pass(
                "database_connectivity",
                format!("connected using `{}`", config.database.url),
            ),
            Err(error) => DoctorCheck::fail(
                "database_connectivity",
                format!("database query failed: {error}"),
            ),
        };
        let readiness = if connectivity.status == CheckStatus::Pass {
            check_routing_readiness(&pool).await
        } else {
            DoctorCheck::skipped("routing_readiness", "the database is unreachable")
        };

        pool.close().await;
        vec![connectivity, readiness]
    })
}

/// The percentage stage is the last resort, so at least one active allocation
/// must point at an active representative.
async fn check_routing_readiness(pool: &DbPool) -> DoctorCheck {
    let reps = match SqlRepRegistry::new(pool.clone()).list_reps().await {
        Ok(reps) => reps,
        Err(error) => {
            return DoctorCheck::fail(
                "routing_readiness",
                format!("could not read representatives ({error}); run `leadroute migrate`"),
            );
        }
    };
    let allocations =
        match SqlRuleStore::new(pool.clone()).list_active_percentage_allocations().await {
            Ok(allocations) => allocations,
            Err(error) => {
                return DoctorCheck::fail(
                    "routing_readiness",
                    format!("could not read percentage allocations: {error}"),
                );
            }
        };

    let active_reps: HashSet<_> = reps.iter().filter(|rep| rep.active).map(|rep| &rep.id).collect();
    let usable = allocations
        .iter()
        .filter(|allocation| {
            allocation.percentage > 0.0 && active_reps.contains(&allocation.sales_rep_id)
        })
        .count();

    if usable == 0 {
        return DoctorCheck::fail(
            "routing_readiness",
            format!(
                "{} active representative(s) but no usable percentage allocation; \
                 leads without a matching rule will be rejected",
                active_reps.len()
            ),
        );
    }

    DoctorCheck::pass(
        "routing_readiness",
        format!(
            "{} active representative(s), {usable} usable percentage allocation(s)",
            active_reps.len()
        ),
    )
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
