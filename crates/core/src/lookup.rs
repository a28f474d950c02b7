use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::normalize_key;

/// Lead attributes known to the CRM for a given email.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookedUpLead {
    pub lead_source: Option<String>,
    pub lead_status: Option<String>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("lead lookup is not configured: {0}")]
    NotConfigured(String),
    #[error("lead lookup request failed: {0}")]
    Transport(String),
    #[error("lead lookup returned an unexpected response: {0}")]
    InvalidResponse(String),
}

/// External lead-attribute lookup keyed by email. Always a soft dependency:
/// callers treat errors the same as "not found".
#[async_trait]
pub trait LeadLookup: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<LookedUpLead>, LookupError>;
}

#[derive(Clone, Debug, Default)]
pub struct StaticLeadLookup {
    leads: HashMap<String, LookedUpLead>,
}

impl StaticLeadLookup {
    pub fn with_lead(mut self, email: &str, lead: LookedUpLead) -> Self {
        self.leads.insert(normalize_key(email), lead);
        self
    }
}

#[async_trait]
impl LeadLookup for StaticLeadLookup {
    async fn find_by_email(&self, email: &str) -> Result<Option<LookedUpLead>, LookupError> {
        Ok(self.leads.get(&normalize_key(email)).cloned())
    }
}
