use std::time::Duration;

use async_trait::async_trait;
use leadroute_core::config::LeadLookupConfig;
use leadroute_core::lookup::{LeadLookup, LookedUpLead, LookupError};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// CRM lead lookup over HTTP.
///
/// Posts `{"email": ...}` with a bearer token and reads the first record of
/// `{"records": [{"lead_source": ..., "status": ...}]}`. A 404 or an empty
/// record list means the CRM has no such lead.
pub struct HttpLeadLookup {
    client: Client,
    endpoint_url: String,
    api_token: SecretString,
}

#[derive(Serialize)]
struct LookupRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    records: Vec<LookupRecord>,
}

#[derive(Debug, Deserialize)]
struct LookupRecord {
    #[serde(default)]
    lead_source: Option<String>,
    #[serde(default, alias = "lead_status")]
    status: Option<String>,
}

impl HttpLeadLookup {
    pub fn new(
        endpoint_url: impl Into<String>,
        api_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| LookupError::NotConfigured(error.to_string()))?;

        Ok(Self { client, endpoint_url: endpoint_url.into(), api_token })
    }

    /// Returns `Ok(None)` when the lookup is disabled.
    pub fn from_config(
        config: &LeadLookupConfig,
        timeout: Duration,
    ) -> Result<Option<Self>, LookupError> {
        if !config.enabled {
            return Ok(None);
        }

        let endpoint_url = config
            .endpoint_url
            .clone()
            .ok_or_else(|| LookupError::NotConfigured("endpoint_url is not set".to_string()))?;
        let api_token = config
            .api_token
            .clone()
            .ok_or_else(|| LookupError::NotConfigured("api_token is not set".to_string()))?;

        Self::new(endpoint_url, api_token, timeout).map(Some)
    }
}

#[async_trait]
impl LeadLookup for HttpLeadLookup {
    async fn find_by_email(&self, email: &str) -> Result<Option<LookedUpLead>, LookupError> {
        let response = self
            .client
            .post(&self.endpoint_url)
            .bearer_auth(self.api_token.expose_secret())
            .json(&LookupRequest { email })
            .send()
            .await
            .map_err(|error| LookupError::Transport(error.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(event_name = "lead_lookup.not_found", "lead lookup returned 404");
            return Ok(None);
        }

        if !response.status().is_success() {
            warn!(
                event_name = "lead_lookup.http_error",
                status = %response.status(),
                "lead lookup endpoint returned an error status"
            );
            return Err(LookupError::Transport(format!(
                "lead lookup endpoint returned {}",
                response.status()
            )));
        }

        let payload: LookupResponse = response
            .json()
            .await
            .map_err(|error| LookupError::InvalidResponse(error.to_string()))?;

        Ok(payload.records.into_iter().next().map(|record| LookedUpLead {
            lead_source: record.lead_source,
            lead_status: record.status,
        }))
    }
}
