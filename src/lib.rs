//! # smsrelay
//!
//! Sends a multiple-choice SMS prompt through Twilio, records the reply as an
//! xAPI statement in a Learning Record Store, and serves the latest answer.
//!
//! ## Endpoints
//!
//! - `GET /` liveness
//! - `POST /start-webhook` send the prompt
//! - `POST /send-message` send arbitrary text to a given number
//! - `POST /twilio-reply` Twilio's incoming-message webhook
//! - `GET /father-response` newest answer, decoded
//!
//! ## Configuration
//!
//! Defaults are overridden by `config/*` files, `RELAY__`-prefixed variables
//! and the usual deployment variables (`TWILIO_ACCOUNT_SID`, `LRS_ENDPOINT`, ...):
//!
//! ```rust,ignore
//! use smsrelay::config::AppConfig;
//!
//! let config = AppConfig::load()?;
//! let app = smsrelay::build_app(&config);
//! ```

pub mod app;
pub mod config;
pub mod logging;

pub use crate::app::{build_app, build_processor};
pub use crate::config::*;

/// Common imports for smsrelay usage
pub mod prelude {
    pub use crate::config::{
        ActivityConfig, AppConfig, CorsConfig, DispatchConfig, LoggingConfig, LrsConfig,
        ServerConfig, TwilioConfig,
    };
    pub use sms_core::*;
    pub use sms_relay::{LatestResponse, OptionTable, RelayProcessor, RelaySettings};
    pub use xapi_lrs::{LrsClient, RecordStore, Statement, StatementQuery};
}
