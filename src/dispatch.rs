// src/dispatch.rs

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::presence::AbsenceCandidate;

pub const NOTIFICATION_TITLE: &str = "No Presence Detected!";
pub const NOTIFICATION_BODY: &str = "Out of store range";

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("push request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        DispatchError::Transport(e.to_string())
    }
}

/// Payload delivered to the push endpoint. The call carries no
/// Authorization header; the bearer token gates the cycle, not the
/// delivery.
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
}

impl PushMessage {
    pub fn for_candidate(candidate: &AbsenceCandidate) -> Self {
        let mut data = HashMap::new();
        data.insert("employee_id".to_string(), candidate.employee_id.clone());
        Self {
            token: candidate.push_token.clone(),
            title: NOTIFICATION_TITLE.to_string(),
            body: NOTIFICATION_BODY.to_string(),
            data,
        }
    }
}

/// Raw HTTP result of a delivery attempt. `Err` is reserved for
/// transport-level failures where no response was received.
#[derive(Debug, Clone)]
pub struct PushDelivery {
    pub status: u16,
    pub body: String,
}

/// Result of one dispatch attempt. `request_curl` is an equivalent cURL
/// command line kept for the audit trail; `response_code` 0 means the
/// request never produced an HTTP response.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub employee_id: String,
    pub request_curl: String,
    pub response_code: u16,
    pub response_message: String,
    #[serde(skip)]
    pub succeeded: bool,
}

#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn deliver(&self, message: &PushMessage) -> Result<PushDelivery, DispatchError>;

    /// Reconstructable representation of the attempt for audit output.
    fn describe(&self, message: &PushMessage) -> String;
}

pub struct HttpPushGateway {
    http_client: Client,
    push_url: String,
}

impl HttpPushGateway {
    pub fn new(http_client: Client, push_url: String) -> Self {
        Self {
            http_client,
            push_url,
        }
    }
}

#[async_trait]
impl PushGateway for HttpPushGateway {
    async fn deliver(&self, message: &PushMessage) -> Result<PushDelivery, DispatchError> {
        let response = self
            .http_client
            .post(&self.push_url)
            .json(message)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(PushDelivery { status, body })
    }

    fn describe(&self, message: &PushMessage) -> String {
        let payload = serde_json::to_string(message).unwrap_or_default();
        format!(
            "curl -X POST '{}' -H 'Content-Type: application/json' -d '{}'",
            self.push_url, payload
        )
    }
}

/// Turns every delivery attempt into a [`DeliveryOutcome`]. Never
/// raises past its boundary, even on total transport failure.
pub struct NotificationDispatcher {
    gateway: Arc<dyn PushGateway>,
}

impl NotificationDispatcher {
    pub fn new(gateway: Arc<dyn PushGateway>) -> Self {
        Self { gateway }
    }

    pub async fn dispatch(&self, candidate: &AbsenceCandidate) -> DeliveryOutcome {
        let message = PushMessage::for_candidate(candidate);
        let request_curl = self.gateway.describe(&message);

        match self.gateway.deliver(&message).await {
            Ok(delivery) => DeliveryOutcome {
                employee_id: candidate.employee_id.clone(),
                request_curl,
                response_code: delivery.status,
                response_message: delivery.body,
                succeeded: delivery.status == 200,
            },
            Err(e) => DeliveryOutcome {
                employee_id: candidate.employee_id.clone(),
                request_curl,
                response_code: 0,
                response_message: e.to_string(),
                succeeded: false,
            },
        }
    }
}
