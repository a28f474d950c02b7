use serde::{Deserialize, Serialize};

use crate::domain::normalize_optional;

/// Lead attributes as supplied by the booking collaborator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub lead_source: Option<String>,
    #[serde(default)]
    pub lead_status: Option<String>,
}

impl LeadRequest {
    /// Normalizes the request into the attributes used for matching. Every
    /// field is optional, so any request yields a routable lead.
    pub fn normalize(&self) -> LeadAttributes {
        LeadAttributes {
            email: normalize_optional(self.email.as_deref()),
            city: normalize_optional(self.city.as_deref()),
            lead_source: normalize_optional(self.lead_source.as_deref()),
            lead_status: normalize_optional(self.lead_status.as_deref()),
        }
    }
}

/// Normalized snapshot of the lead attributes a decision was made with.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadAttributes {
    pub email: Option<String>,
    pub city: Option<String>,
    pub lead_source: Option<String>,
    pub lead_status: Option<String>,
}

impl LeadAttributes {
    /// Email usable as a lookup key. Values without an `@` are kept on the
    /// record but never sent to the lookup.
    pub fn lookup_email(&self) -> Option<&str> {
        self.email.as_deref().filter(|email| email.contains('@'))
    }
}
