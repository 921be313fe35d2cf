use serde::Deserialize;
use serde_json::json;
use sms_core::{
    Headers, HttpStatus, InboundWebhook, SendRequest, SendResponse, SmsClient, SmsError,
    WebhookResponse,
};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};
use xapi_lrs::{LrsError, RecordStore};

use crate::options::{normalize_reply, Decoded, NO_RESPONSE, UNKNOWN_RESPONSE};
use crate::RelaySettings;

/// Failures of a single relay request. None of them is retried.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("verification failed: {0}")]
    VerificationFailed(String),
    #[error("send failed: {0}")]
    Send(#[source] SmsError),
    #[error("failed to record reply: {0}")]
    Record(#[source] LrsError),
    #[error("failed to read latest response: {0}")]
    Query(#[source] LrsError),
}

/// Optional body of a dispatch trigger.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
    course_id: Option<String>,
}

/// Body of a direct send: arbitrary text to an arbitrary number.
#[derive(Debug, Deserialize)]
struct DirectSendRequest {
    #[serde(default)]
    to: String,
    #[serde(default)]
    message: String,
}

/// Outcome of a stored reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedReply {
    pub from: String,
    pub code: String,
    pub statement_id: String,
}

/// The newest answer, as shown to a polling client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LatestResponse {
    NoResponse,
    Known { code: String, label: String },
    Unknown { code: String },
}

impl LatestResponse {
    pub fn display(&self) -> &str {
        match self {
            LatestResponse::NoResponse => NO_RESPONSE,
            LatestResponse::Known { label, .. } => label,
            LatestResponse::Unknown { .. } => UNKNOWN_RESPONSE,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            LatestResponse::NoResponse => json!({ "response": NO_RESPONSE }),
            LatestResponse::Known { code, label } => json!({ "response": label, "raw": code }),
            LatestResponse::Unknown { code } if code.is_empty() => {
                json!({ "response": UNKNOWN_RESPONSE })
            }
            LatestResponse::Unknown { code } => json!({ "response": UNKNOWN_RESPONSE, "raw": code }),
        }
    }
}

/// Framework-agnostic processor behind every relay endpoint.
#[derive(Clone)]
pub struct RelayProcessor {
    sms: Arc<dyn SmsClient>,
    inbound: Arc<dyn InboundWebhook>,
    store: Arc<dyn RecordStore>,
    settings: Arc<RelaySettings>,
}

impl RelayProcessor {
    pub fn new(
        sms: Arc<dyn SmsClient>,
        inbound: Arc<dyn InboundWebhook>,
        store: Arc<dyn RecordStore>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            sms,
            inbound,
            store,
            settings: Arc::new(settings),
        }
    }

    /// Send the option prompt to the configured destination. One message per call.
    pub async fn send_prompt(&self, course_id: Option<&str>) -> Result<SendResponse, RelayError> {
        let settings = &self.settings;
        let text = settings.options.prompt(&settings.prompt_intro);
        info!(
            course_id = course_id.unwrap_or("-"),
            "Dispatching prompt to {}", settings.destination
        );

        let sent = self
            .sms
            .send(SendRequest {
                to: &settings.destination,
                from: &settings.sender,
                text: &text,
            })
            .await
            .map_err(RelayError::Send)?;
        info!("Prompt sent with id {}", sent.id);
        Ok(sent)
    }

    /// Send `text` to `to` from the configured sender. Nothing is recorded.
    pub async fn send_message(&self, to: &str, text: &str) -> Result<SendResponse, RelayError> {
        let to = to.trim();
        if to.is_empty() {
            return Err(RelayError::BadRequest("missing `to`".into()));
        }
        info!("Direct send to {}", to);

        let sent = self
            .sms
            .send(SendRequest {
                to,
                from: &self.settings.sender,
                text,
            })
            .await
            .map_err(RelayError::Send)?;
        info!("Message sent with id {}", sent.id);
        Ok(sent)
    }

    /// Verify, parse and store one inbound reply.
    pub async fn record_reply(
        &self,
        headers: &Headers,
        body: &[u8],
    ) -> Result<RecordedReply, RelayError> {
        self.inbound
            .verify(&self.settings.webhook_url, headers, body)
            .map_err(|e| RelayError::VerificationFailed(e.to_string()))?;
        let message = self
            .inbound
            .parse_inbound(headers, body)
            .map_err(|e| RelayError::BadRequest(e.to_string()))?;

        // The sender is not checked against the dispatch destination.
        let code = normalize_reply(&message.text);
        info!(from = %message.from, code = %code, "Reply received");

        let statement = self
            .settings
            .statement
            .build(&code, OffsetDateTime::now_utc());
        let statement_id = self
            .store
            .save_statement(&statement)
            .await
            .map_err(RelayError::Record)?;

        Ok(RecordedReply {
            from: message.from,
            code,
            statement_id,
        })
    }

    /// Newest matching statement, decoded through the option table.
    pub async fn read_latest(&self) -> Result<LatestResponse, RelayError> {
        let query = self.settings.statement.latest_query();
        let latest = self
            .store
            .latest_statement(&query)
            .await
            .map_err(RelayError::Query)?;

        let Some(statement) = latest else {
            debug!("No reply stored yet");
            return Ok(LatestResponse::NoResponse);
        };
        let code = statement.response().unwrap_or_default().to_string();
        Ok(match self.settings.options.decode(&code) {
            Decoded::Known(label) => LatestResponse::Known {
                label: label.to_string(),
                code,
            },
            Decoded::Unknown => {
                debug!("Stored code {:?} is not a known option", code);
                LatestResponse::Unknown { code }
            }
        })
    }

    /// `POST /start-webhook`
    pub async fn process_start(&self, body: &[u8]) -> WebhookResponse {
        let request = match parse_start(body) {
            Ok(request) => request,
            Err(e) => return self.error_to_response(e),
        };
        match self.send_prompt(request.course_id.as_deref()).await {
            Ok(sent) => WebhookResponse::json(
                HttpStatus::Ok,
                &json!({
                    "status": "sent",
                    "sid": sent.id,
                    "to": sent.to,
                    "from": sent.from,
                }),
            ),
            Err(e) => self.error_to_response(e),
        }
    }

    /// `POST /send-message`
    pub async fn process_send(&self, body: &[u8]) -> WebhookResponse {
        let request: DirectSendRequest = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                return self.error_to_response(RelayError::BadRequest(format!("json body: {}", e)));
            }
        };
        match self.send_message(&request.to, &request.message).await {
            Ok(sent) => WebhookResponse::json(
                HttpStatus::Ok,
                &json!({ "success": true, "sid": sent.id }),
            ),
            Err(RelayError::Send(e)) => {
                error!("Direct send failed: {}", e);
                WebhookResponse::json(
                    HttpStatus::InternalServerError,
                    &json!({ "success": false, "error": e.to_string() }),
                )
            }
            Err(e) => self.error_to_response(e),
        }
    }

    /// `POST /twilio-reply`
    pub async fn process_reply(&self, headers: &Headers, body: &[u8]) -> WebhookResponse {
        match self.record_reply(headers, body).await {
            Ok(_) => self.inbound.acknowledge(&self.settings.acknowledgment),
            Err(e) => self.error_to_response(e),
        }
    }

    /// `GET /father-response`
    pub async fn process_latest(&self) -> WebhookResponse {
        match self.read_latest().await {
            Ok(latest) => WebhookResponse::json(HttpStatus::Ok, &latest.to_json()),
            Err(e) => self.error_to_response(e),
        }
    }

    fn error_to_response(&self, error: RelayError) -> WebhookResponse {
        match error {
            RelayError::BadRequest(msg) => {
                warn!("Rejected request: {}", msg);
                WebhookResponse::error(HttpStatus::BadRequest, &format!("invalid request: {}", msg))
            }
            RelayError::VerificationFailed(msg) => {
                warn!("Webhook verification failed: {}", msg);
                WebhookResponse::error(HttpStatus::Unauthorized, "verification failed")
            }
            RelayError::Send(e) => {
                error!("Prompt dispatch failed: {}", e);
                WebhookResponse::json(
                    HttpStatus::InternalServerError,
                    &json!({ "status": "error", "error": e.to_string() }),
                )
            }
            RelayError::Record(e) => {
                error!("Reply dropped, record store write failed: {}", e);
                WebhookResponse::error(HttpStatus::InternalServerError, "failed to record reply")
            }
            RelayError::Query(e) => {
                error!("Record store query failed: {}", e);
                WebhookResponse::error(
                    HttpStatus::InternalServerError,
                    "failed to read latest response",
                )
            }
        }
    }
}

fn parse_start(body: &[u8]) -> Result<StartRequest, RelayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(StartRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| RelayError::BadRequest(format!("json body: {}", e)))
}
