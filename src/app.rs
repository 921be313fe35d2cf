use axum::Router;
use sms_relay::RelayProcessor;
use sms_twilio::TwilioClient;
use sms_web_axum::AppState;
use std::sync::Arc;
use xapi_lrs::LrsClient;

use crate::config::AppConfig;

/// Build the relay processor with the Twilio and LRS clients described by `config`.
pub fn build_processor(config: &AppConfig) -> RelayProcessor {
    let twilio = Arc::new(
        TwilioClient::with_base_url(
            config.twilio.account_sid.as_str(),
            config.twilio.auth_token.as_str(),
            config.twilio.base_url.clone(),
        )
        .with_signature_verification(config.twilio.verify_signatures),
    );
    let lrs = LrsClient::new(
        config.lrs.endpoint.as_str(),
        config.lrs.username.as_str(),
        config.lrs.password.as_str(),
    )
    .with_version(config.lrs.version.as_str());

    RelayProcessor::new(
        twilio.clone(),
        twilio,
        Arc::new(lrs),
        config.relay_settings(),
    )
}

/// The complete HTTP application (shared between the binary and tests).
pub fn build_app(config: &AppConfig) -> Router {
    let state = AppState {
        processor: build_processor(config),
    };
    sms_web_axum::router(state, &config.cors.allowed_origins)
}
