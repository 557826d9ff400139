use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use uuid::Uuid;

use super::error::TransportError;
use super::wire::{EncounterRequest, RegistryResponse};
use crate::config::RegistryConfig;

/// Path of the record-encounter operation under the registry base URL.
pub const RECORD_ENCOUNTER_PATH: &str = "/air/immunisation/v1.4/encounters/record";

/// The registry's record-encounter operation.
///
/// One call submits the encounters of one individual for one information
/// provider. Implementations must not retry internally; backoff belongs to
/// the caller.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn record_encounter(
        &self,
        request: &EncounterRequest,
    ) -> Result<RegistryResponse, TransportError>;
}

/// reqwest-backed client for the registry's HTTP API.
pub struct HttpRegistryClient {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
    api_key: Option<String>,
    bearer_token: Option<String>,
    product_id: String,
}

impl HttpRegistryClient {
    pub fn new(config: &RegistryConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs: config.timeout_secs,
            api_key: config.api_key.clone(),
            bearer_token: config.bearer_token.clone(),
            product_id: config.product_id.clone(),
        })
    }

    fn headers(&self, request: &EncounterRequest) -> Result<HeaderMap, TransportError> {
        fn value(v: &str) -> Result<HeaderValue, TransportError> {
            HeaderValue::from_str(v).map_err(|e| TransportError::Request(e.to_string()))
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "dhs-correlationid",
            value(&format!("urn:uuid:{}", Uuid::new_v4()))?,
        );
        headers.insert(
            "dhs-auditid",
            value(&request.information_provider.provider_number)?,
        );
        headers.insert("dhs-auditidtype", HeaderValue::from_static("Minor Id"));
        if let Some(subject) = request.subject_id() {
            headers.insert("dhs-subjectid", value(subject)?);
            headers.insert("dhs-subjectidtype", HeaderValue::from_static("Date of Birth"));
        }
        headers.insert("dhs-productid", value(&self.product_id)?);
        if let Some(key) = &self.api_key {
            headers.insert("x-ibm-client-id", value(key)?);
        }
        if let Some(token) = &self.bearer_token {
            headers.insert(AUTHORIZATION, value(&format!("Bearer {token}"))?);
        }
        Ok(headers)
    }

    fn map_send_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            TransportError::Connection(self.base_url.clone())
        } else if e.is_builder() {
            TransportError::Request(e.to_string())
        } else {
            TransportError::Interrupted(e.to_string())
        }
    }
}

/// Interpret an HTTP answer from the registry.
///
/// The registry reports business validation failures with 4xx statuses and a
/// normal body, so anything that parses as a `RegistryResponse` is a business
/// outcome regardless of the HTTP status.
pub(crate) fn decode_body(status: u16, body: &str) -> Result<RegistryResponse, TransportError> {
    match serde_json::from_str::<RegistryResponse>(body) {
        Ok(parsed) => Ok(parsed),
        Err(e) if (200..300).contains(&status) => Err(TransportError::Decode(e.to_string())),
        Err(_) => Err(TransportError::Status {
            status,
            body: body.to_string(),
        }),
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn record_encounter(
        &self,
        request: &EncounterRequest,
    ) -> Result<RegistryResponse, TransportError> {
        let url = format!("{}{}", self.base_url, RECORD_ENCOUNTER_PATH);

        let response = self
            .client
            .post(&url)
            .headers(self.headers(request)?)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        decode_body(status, &body)
    }
}
