use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::rep::SalesRepId;
use crate::domain::routing_log::{RoutingLogEntry, RoutingMethod};
use crate::domain::normalize_key;

/// Look-back windows offered by the routing dashboard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatsWindow {
    #[serde(rename = "24h")]
    Day,
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "1m")]
    Month,
    #[serde(rename = "3m")]
    Quarter,
    #[serde(rename = "6m")]
    HalfYear,
}

impl StatsWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "24h",
            Self::Week => "7d",
            Self::Month => "1m",
            Self::Quarter => "3m",
            Self::HalfYear => "6m",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_key(raw).as_str() {
            "24h" => Some(Self::Day),
            "7d" => Some(Self::Week),
            "1m" => Some(Self::Month),
            "3m" => Some(Self::Quarter),
            "6m" => Some(Self::HalfYear),
            _ => None,
        }
    }

    /// Inclusive lower bound of the window ending at `now`. Month windows are
    /// calendar months, clamped to the end of shorter months.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let start = match self {
            Self::Day => now.checked_sub_signed(Duration::hours(24)),
            Self::Week => now.checked_sub_signed(Duration::days(7)),
            Self::Month => now.checked_sub_months(Months::new(1)),
            Self::Quarter => now.checked_sub_months(Months::new(3)),
            Self::HalfYear => now.checked_sub_months(Months::new(6)),
        };
        start.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCount {
    pub method: RoutingMethod,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepCount {
    pub sales_rep_id: SalesRepId,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingStats {
    pub window: StatsWindow,
    pub since: DateTime<Utc>,
    pub total: u64,
    /// One row per method, zero counts included, in cascade order.
    pub by_method: Vec<MethodCount>,
    /// Percentage-stage assignments per representative, busiest first.
    pub percentage_by_rep: Vec<RepCount>,
}

impl RoutingStats {
    /// Aggregates entries recorded at or after `window.start(now)`; older entries are ignored.
    pub fn from_entries(
        window: StatsWindow,
        now: DateTime<Utc>,
        entries: &[RoutingLogEntry],
    ) -> Self {
        let since = window.start(now);
        let mut method_counts: BTreeMap<RoutingMethod, u64> =
            RoutingMethod::ALL.iter().map(|method| (*method, 0)).collect();
        let mut rep_counts: BTreeMap<SalesRepId, u64> = BTreeMap::new();
        let mut total = 0;

        for entry in entries.iter().filter(|entry| entry.recorded_at >= since) {
            total += 1;
            *method_counts.entry(entry.method).or_default() += 1;
            if entry.method == RoutingMethod::Percentage {
                *rep_counts.entry(entry.sales_rep_id.clone()).or_default() += 1;
            }
        }

        let by_method = method_counts
            .into_iter()
            .map(|(method, count)| MethodCount { method, count })
            .collect();

        let mut percentage_by_rep: Vec<RepCount> = rep_counts
            .into_iter()
            .map(|(sales_rep_id, count)| RepCount { sales_rep_id, count })
            .collect();
        percentage_by_rep.sort_by(|left, right| {
            right.count.cmp(&left.count).then_with(|| left.sales_rep_id.cmp(&right.sales_rep_id))
        });

        Self { window, since, total, by_method, percentage_by_rep }
    }

    pub fn count_for(&self, method: RoutingMethod) -> u64 {
        self.by_method.iter().find(|row| row.method == method).map(|row| row.count).unwrap_or(0)
    }
}
