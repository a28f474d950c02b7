use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SalesRepId(pub String);

impl std::fmt::Display for SalesRepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesRepresentative {
    pub id: SalesRepId,
    pub name: String,
    pub email: String,
    pub active: bool,
    #[serde(default)]
    pub calendar_id: Option<String>,
}

impl SalesRepresentative {
    pub fn summary(&self) -> SalesRepSummary {
        SalesRepSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            calendar_id: self.calendar_id().to_string(),
        }
    }

    /// Calendar the booking flow schedules against. Falls back to the email when
    /// no dedicated calendar is configured.
    pub fn calendar_id(&self) -> &str {
        self.calendar_id
            .as_deref()
            .map(str::trim)
            .filter(|calendar| !calendar.is_empty())
            .unwrap_or(&self.email)
    }
}

/// Public projection of a representative returned to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesRepSummary {
    pub id: SalesRepId,
    pub name: String,
    pub email: String,
    pub calendar_id: String,
}

#[cfg(test)]
mod tests {
    use super::{SalesRepId, SalesRepresentative};

    fn rep(calendar_id: Option<&str>) -> SalesRepresentative {
        SalesRepresentative {
            id: SalesRepId("rep-a".to_string()),
            name: "Avery".to_string(),
            email: "avery@example.com".to_string(),
            active: true,
            calendar_id: calendar_id.map(str::to_string),
        }
    }

    #[test]
    fn calendar_defaults_to_email() {
        assert_eq!(rep(None).calendar_id(), "avery@example.com");
        assert_eq!(rep(Some("  ")).calendar_id(), "avery@example.com");
    }

    #[test]
    fn dedicated_calendar_is_exposed_in_summary() {
        let summary = rep(Some("team-west@calendar.example.com")).summary();
        assert_eq!(summary.calendar_id, "team-west@calendar.example.com");
        assert_eq!(summary.email, "avery@example.com");
    }
}
