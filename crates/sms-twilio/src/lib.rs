//! # Twilio SMS Provider
//!
//! Twilio backend for smsrelay: outbound sends through the Messages REST API,
//! inbound reply parsing, optional `X-Twilio-Signature` verification and TwiML
//! acknowledgments.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sms_core::{
    header_value, Headers, InboundMessage, InboundWebhook, SendRequest, SendResponse, SmsClient,
    SmsError, WebhookResponse,
};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

pub mod signature;
pub mod twiml;

const PROVIDER: &str = "twilio";

/// Header Twilio uses to carry the request signature.
pub const SIGNATURE_HEADER: &str = "X-Twilio-Signature";

/// Twilio REST client.
#[derive(Clone, Debug)]
pub struct TwilioClient {
    /// Twilio Account SID (username for Basic auth).
    pub account_sid: String,
    /// Twilio Auth Token (password for Basic auth, HMAC key for signatures).
    pub auth_token: String,
    /// API base URL; override for testing/mocking.
    pub base_url: String,
    verify_signatures: bool,
    http: reqwest::Client,
}

impl TwilioClient {
    pub fn new<S: Into<String>>(account_sid: S, auth_token: S) -> Self {
        Self::with_base_url(account_sid, auth_token, "https://api.twilio.com".to_string())
    }

    pub fn with_base_url<S: Into<String>>(account_sid: S, auth_token: S, base_url: String) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            base_url,
            verify_signatures: false,
            http: reqwest::Client::new(),
        }
    }

    /// Require a valid `X-Twilio-Signature` on inbound webhooks.
    pub fn with_signature_verification(mut self, enabled: bool) -> Self {
        self.verify_signatures = enabled;
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url.trim_end_matches('/'),
            self.account_sid
        )
    }
}

#[derive(Debug, Serialize)]
struct TwilioSendRequest<'a> {
    #[serde(rename = "To")]
    to: &'a str,
    #[serde(rename = "From")]
    from: &'a str,
    #[serde(rename = "Body")]
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct TwilioSendResponse {
    sid: Option<String>,
    to: Option<String>,
    from: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorResponse {
    code: Option<i64>,
    message: String,
}

#[async_trait]
impl SmsClient for TwilioClient {
    async fn send(&self, req: SendRequest<'_>) -> Result<SendResponse, SmsError> {
        info!("Sending SMS via Twilio to {}", req.to);

        let payload = TwilioSendRequest {
            to: req.to,
            from: req.from,
            body: req.text,
        };
        let res = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&payload)
            .send()
            .await
            .map_err(|e| {
                error!("Twilio request failed: {}", e);
                SmsError::Http(e.to_string())
            })?;

        let status = res.status();
        let raw_text = res
            .text()
            .await
            .map_err(|e| SmsError::Http(e.to_string()))?;

        if !status.is_success() {
            // Twilio error bodies carry a human readable `message`; fall back to the raw body.
            let detail = match serde_json::from_str::<TwilioErrorResponse>(&raw_text) {
                Ok(TwilioErrorResponse {
                    code: Some(code),
                    message,
                }) => format!("{} (code {})", message, code),
                Ok(TwilioErrorResponse { message, .. }) => message,
                Err(_) => raw_text,
            };
            error!("Twilio rejected send with HTTP {}: {}", status, detail);
            return Err(match status.as_u16() {
                401 | 403 => SmsError::Auth(detail),
                _ => SmsError::Provider(format!("HTTP {}: {}", status, detail)),
            });
        }

        let raw_json: serde_json::Value = serde_json::from_str(&raw_text)
            .unwrap_or_else(|_| serde_json::json!({ "raw": raw_text }));
        let parsed: TwilioSendResponse =
            serde_json::from_value(raw_json.clone()).unwrap_or(TwilioSendResponse {
                sid: None,
                to: None,
                from: None,
            });

        let id = parsed.sid.unwrap_or_else(|| {
            warn!("Twilio response carried no sid, using a fallback id");
            sms_core::fallback_id()
        });
        info!("SMS queued via Twilio with sid {}", id);

        Ok(SendResponse {
            id,
            to: parsed.to.unwrap_or_else(|| req.to.to_string()),
            from: parsed.from.unwrap_or_else(|| req.from.to_string()),
            provider: PROVIDER,
            raw: raw_json,
        })
    }
}

/// Form fields Twilio posts to an incoming-message webhook.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TwilioInbound {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To", default)]
    pub to: String,
    #[serde(rename = "Body")]
    pub body: String,
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl From<TwilioInbound> for InboundMessage {
    fn from(t: TwilioInbound) -> Self {
        let raw = serde_json::to_value(&t).unwrap_or_default();
        InboundMessage {
            id: t.message_sid,
            from: t.from,
            to: t.to,
            text: t.body,
            provider: PROVIDER,
            raw,
        }
    }
}

impl InboundWebhook for TwilioClient {
    fn parse_inbound(&self, _headers: &Headers, body: &[u8]) -> Result<InboundMessage, SmsError> {
        let inbound: TwilioInbound = serde_urlencoded::from_bytes(body)
            .map_err(|e| SmsError::Invalid(format!("form decode: {}", e)))?;
        debug!("Parsed Twilio inbound message from {}", inbound.from);
        Ok(inbound.into())
    }

    fn verify(&self, url: &str, headers: &Headers, body: &[u8]) -> Result<(), SmsError> {
        if !self.verify_signatures {
            return Ok(());
        }
        let provided = header_value(headers, SIGNATURE_HEADER).ok_or_else(|| {
            warn!("Inbound webhook without {} header", SIGNATURE_HEADER);
            SmsError::Auth(format!("missing {} header", SIGNATURE_HEADER))
        })?;
        signature::verify(&self.auth_token, url, body, provided)
    }

    fn acknowledge(&self, message: &str) -> WebhookResponse {
        if message.is_empty() {
            WebhookResponse::xml(twiml::empty_response())
        } else {
            WebhookResponse::xml(twiml::messaging_response(message))
        }
    }
}
