//! # SMS Core
//!
//! Core traits and types shared by the smsrelay crates.
//!
//! This crate provides the provider-agnostic building blocks:
//! - [`SmsClient`] trait for sending a single SMS
//! - [`InboundWebhook`] trait for verifying and parsing reply webhooks
//! - [`WebhookResponse`], a framework-neutral response that web adapters convert
//!
//! ## Example
//!
//! ```rust,ignore
//! use sms_core::{SendRequest, SmsClient};
//!
//! let response = client.send(SendRequest {
//!     to: "+15550002222",
//!     from: "+15550001111",
//!     text: "Reply A, B, C or D",
//! }).await?;
//! println!("queued as {}", response.id);
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors that can occur during SMS operations
#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    /// HTTP communication error
    #[error("http error: {0}")]
    Http(String),
    /// Authentication/authorization error
    #[error("authentication error: {0}")]
    Auth(String),
    /// Invalid request parameters or payload
    #[error("invalid request: {0}")]
    Invalid(String),
    /// SMS provider returned an error
    #[error("provider error: {0}")]
    Provider(String),
    /// Unexpected error occurred
    #[error("unexpected: {0}")]
    Unexpected(String),
}

/// HTTP status code for web responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok = 200,
    BadRequest = 400,
    Unauthorized = 401,
    InternalServerError = 500,
}

impl HttpStatus {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest<'a> {
    pub to: &'a str,
    pub from: &'a str,
    pub text: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponse {
    /// Provider-assigned message id.
    pub id: String,
    /// Destination as resolved by the provider.
    pub to: String,
    /// Sender as resolved by the provider.
    pub from: String,
    /// Name of the backend/provider that produced the response, e.g. "twilio".
    pub provider: &'static str,
    /// Raw provider payload for debugging / audit.
    pub raw: serde_json::Value,
}

/// Normalized inbound message (e.g., a reply).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: Option<String>,
    pub from: String,
    pub to: String,
    pub text: String,
    pub provider: &'static str,
    pub raw: serde_json::Value,
}

/// Generic response that can be converted to any framework's response type
#[derive(Debug, Clone)]
pub struct WebhookResponse {
    pub status: HttpStatus,
    pub body: String,
    pub content_type: String,
}

impl WebhookResponse {
    pub fn json(status: HttpStatus, value: &serde_json::Value) -> Self {
        Self {
            status,
            body: value.to_string(),
            content_type: "application/json".to_string(),
        }
    }

    pub fn xml(body: String) -> Self {
        Self {
            status: HttpStatus::Ok,
            body,
            content_type: "text/xml".to_string(),
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: HttpStatus::Ok,
            body: body.into(),
            content_type: "text/plain; charset=utf-8".to_string(),
        }
    }

    pub fn error(status: HttpStatus, message: &str) -> Self {
        Self::json(status, &serde_json::json!({ "error": message }))
    }
}

#[async_trait]
pub trait SmsClient: Send + Sync {
    /// Send a single text SMS.
    async fn send(&self, req: SendRequest<'_>) -> Result<SendResponse, SmsError>;
}

/// Utility to create a pseudo id if a provider doesn't return one.
pub fn fallback_id() -> String {
    Uuid::new_v4().to_string()
}

/// Lightweight header representation to avoid tying the core to any HTTP framework.
pub type Headers = Vec<(String, String)>;

/// Case-insensitive header lookup.
pub fn header_value<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Provider-agnostic inbound webhook interface.
pub trait InboundWebhook: Send + Sync {
    /// Parse the incoming HTTP payload (headers + raw body) into a normalized `InboundMessage`.
    fn parse_inbound(&self, headers: &Headers, body: &[u8]) -> Result<InboundMessage, SmsError>;

    /// Optional signature verification (no-op by default).
    ///
    /// `url` is the public URL the provider posted to.
    fn verify(&self, _url: &str, _headers: &Headers, _body: &[u8]) -> Result<(), SmsError> {
        Ok(())
    }

    /// Successful webhook reply in the format the provider expects.
    fn acknowledge(&self, message: &str) -> WebhookResponse {
        WebhookResponse::text(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_is_json() {
        let response = WebhookResponse::error(HttpStatus::InternalServerError, r#"bad "thing""#);
        assert_eq!(response.status.as_u16(), 500);
        assert_eq!(response.content_type, "application/json");
        let parsed: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(parsed["error"], r#"bad "thing""#);
    }

    #[test]
    fn xml_response_content_type() {
        let response = WebhookResponse::xml("<Response/>".into());
        assert_eq!(response.status, HttpStatus::Ok);
        assert_eq!(response.content_type, "text/xml");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let headers: Headers = vec![("X-Twilio-Signature".into(), "abc".into())];
        assert_eq!(header_value(&headers, "x-twilio-signature"), Some("abc"));
        assert_eq!(header_value(&headers, "content-type"), None);
    }

    #[test]
    fn fallback_ids_are_unique() {
        assert_ne!(fallback_id(), fallback_id());
    }
}
