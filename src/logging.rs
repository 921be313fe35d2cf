use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
pub fn init(config: &LoggingConfig) -> Result<(), BoxError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.format.as_str() {
        "pretty" => builder.pretty().try_init(),
        _ => builder.json().try_init(),
    }
}
