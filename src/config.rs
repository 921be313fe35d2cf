use config::{Config, ConfigError, Environment, File, builder::DefaultState};
use serde::{Deserialize, Serialize};
use sms_relay::{OptionTable, RelaySettings, ReplyOption, StatementTemplate, default_options};
use std::env;
use tracing::warn;

type Builder = config::ConfigBuilder<DefaultState>;

/// Application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Cross-origin policy for browser clients
    pub cors: CorsConfig,
    /// Twilio account and webhook settings
    pub twilio: TwilioConfig,
    /// Where the prompt goes and what the replier hears back
    pub dispatch: DispatchConfig,
    /// Learning Record Store connection
    pub lrs: LrsConfig,
    /// Fixed identifiers written into every statement
    pub activity: ActivityConfig,
    /// Reply choices, in prompt order
    pub options: Vec<ReplyOption>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Server host (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 3000)
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    /// Origins allowed to call the API from a browser
    pub allowed_origins: Vec<String>,
}

/// Twilio provider configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TwilioConfig {
    /// Twilio Account SID
    pub account_sid: String,
    /// Twilio Auth Token
    pub auth_token: String,
    /// Sender phone number
    pub from_number: String,
    /// REST API base URL (default: https://api.twilio.com)
    pub base_url: String,
    /// Webhook signature validation (default: false)
    pub verify_signatures: bool,
    /// Public URL Twilio posts replies to; required for signature validation
    pub webhook_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DispatchConfig {
    /// Destination phone number
    pub to_number: String,
    /// Line printed above the options
    pub prompt_intro: String,
    /// Message relayed back after a reply is stored
    pub acknowledgment: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LrsConfig {
    /// xAPI endpoint, e.g. https://lrs.example/xapi
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// X-Experience-API-Version header (default: 1.0.3)
    pub version: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ActivityConfig {
    pub actor_name: String,
    pub actor_mbox: String,
    pub verb_id: String,
    pub verb_display: String,
    pub activity_id: String,
    pub activity_name: String,
    pub parent_activity_id: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: json or pretty (default: json)
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
        }
    }
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            base_url: "https://api.twilio.com".to_string(),
            verify_signatures: false,
            webhook_url: String::new(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        let relay = RelaySettings::default();
        Self {
            to_number: String::new(),
            prompt_intro: relay.prompt_intro,
            acknowledgment: relay.acknowledgment,
        }
    }
}

impl Default for LrsConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            username: String::new(),
            password: String::new(),
            version: xapi_lrs::XAPI_VERSION.to_string(),
        }
    }
}

impl Default for ActivityConfig {
    fn default() -> Self {
        let t = StatementTemplate::default();
        Self {
            actor_name: t.actor_name,
            actor_mbox: t.actor_mbox,
            verb_id: t.verb_id,
            verb_display: t.verb_display,
            activity_id: t.activity_id,
            activity_name: t.activity_name,
            parent_activity_id: t.parent_activity_id,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cors: CorsConfig::default(),
            twilio: TwilioConfig::default(),
            dispatch: DispatchConfig::default(),
            lrs: LrsConfig::default(),
            activity: ActivityConfig::default(),
            options: default_options(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Unprefixed variables commonly used by deployments, and the keys they set.
const ENV_ALIASES: &[(&str, &str)] = &[
    ("TWILIO_ACCOUNT_SID", "twilio.account_sid"),
    ("TWILIO_AUTH_TOKEN", "twilio.auth_token"),
    ("TWILIO_PHONE", "twilio.from_number"),
    ("TWILIO_WEBHOOK_URL", "twilio.webhook_url"),
    ("TARGET_PHONE", "dispatch.to_number"),
    ("LRS_ENDPOINT", "lrs.endpoint"),
    ("LRS_USERNAME", "lrs.username"),
    ("LRS_PASSWORD", "lrs.password"),
    ("PORT", "server.port"),
];

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| env::var(key).ok())
    }

    /// Same as [`AppConfig::load`], reading the unprefixed variables through `lookup`.
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let run_mode = lookup("RUN_MODE").unwrap_or_else(|| "development".into());

        let builder = Config::builder()
            // Start with default configuration
            .add_source(Config::try_from(&AppConfig::default())?)
            // Add configuration file based on environment
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local configuration file (gitignored)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (prefixed with RELAY__)
            .add_source(Environment::with_prefix("RELAY").separator("__"));

        apply_env_aliases(builder, &lookup)?.build()?.try_deserialize()
    }

    /// The immutable pipeline settings derived from this configuration.
    pub fn relay_settings(&self) -> RelaySettings {
        let a = &self.activity;
        RelaySettings {
            destination: self.dispatch.to_number.clone(),
            sender: self.twilio.from_number.clone(),
            prompt_intro: self.dispatch.prompt_intro.clone(),
            options: OptionTable::new(self.options.iter().cloned()),
            statement: StatementTemplate {
                actor_name: a.actor_name.clone(),
                actor_mbox: a.actor_mbox.clone(),
                verb_id: a.verb_id.clone(),
                verb_display: a.verb_display.clone(),
                activity_id: a.activity_id.clone(),
                activity_name: a.activity_name.clone(),
                parent_activity_id: a.parent_activity_id.clone(),
            },
            acknowledgment: self.dispatch.acknowledgment.clone(),
            webhook_url: self.twilio.webhook_url.clone(),
        }
    }

    /// Names of required settings that are still empty.
    ///
    /// Missing values are not fatal; the first request that needs one fails.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let required = [
            ("twilio.account_sid", &self.twilio.account_sid),
            ("twilio.auth_token", &self.twilio.auth_token),
            ("twilio.from_number", &self.twilio.from_number),
            ("dispatch.to_number", &self.dispatch.to_number),
            ("lrs.endpoint", &self.lrs.endpoint),
            ("lrs.username", &self.lrs.username),
            ("lrs.password", &self.lrs.password),
        ];
        let mut missing: Vec<&'static str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if self.twilio.verify_signatures && self.twilio.webhook_url.is_empty() {
            missing.push("twilio.webhook_url");
        }
        missing
    }

    pub fn warn_missing_settings(&self) {
        for name in self.missing_settings() {
            warn!("Configuration value {} is not set", name);
        }
        if self.options.is_empty() {
            warn!("No reply options configured, every reply will decode as unknown");
        }
    }
}

fn apply_env_aliases<F>(mut builder: Builder, lookup: &F) -> Result<Builder, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for (var, key) in ENV_ALIASES {
        builder = builder.set_override_option(*key, lookup(var))?;
    }
    if let Some(origins) = lookup("CORS_ORIGINS") {
        let origins: Vec<String> = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
        builder = builder.set_override("cors.allowed_origins", origins)?;
    }
    Ok(builder)
}
