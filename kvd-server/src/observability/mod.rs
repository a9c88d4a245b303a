//! Logging setup for the kvd process.
//!
//! The output format is selected with `KVD_LOG_FORMAT` (or `log_format` in
//! the node configuration file):
//! - `json` - one JSON object per event
//! - `pretty` - multi-line, human-readable output (default on a TTY)
//! - `compact` - single-line output (default otherwise)
//!
//! The filter comes from the `-v` flag, `RUST_LOG`, `KVD_LOG_LEVEL` or the
//! `log_level` config field. The first one set wins.
//!
//! ```ignore
//! use kvd_server::observability::{LogFormat, TracingConfig, init_tracing};
//!
//! let config = TracingConfig::builder()
//!     .log_format(LogFormat::Json)
//!     .log_filter("info,openraft=warn")
//!     .build();
//! let _guard = init_tracing(config)?;
//! ```

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig, TracingConfigBuilder};
pub use tracing_setup::{TracingGuard, init_tracing};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.service_name(), "kvd");
        assert_eq!(config.log_format(), LogFormat::Compact);
        assert_eq!(config.log_filter(), "info");
    }

    #[test]
    fn config_builder() {
        let config = TracingConfig::builder()
            .service_name("node-1")
            .log_format(LogFormat::Json)
            .log_filter("debug")
            .include_location(true)
            .build();

        assert_eq!(config.service_name(), "node-1");
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.log_filter(), "debug");
        assert!(config.include_location());
        assert!(config.include_target());
    }

    #[test]
    fn log_format_parsing_falls_back_to_default() {
        assert_eq!("JSON".parse::<LogFormat>().ok(), Some(LogFormat::Json));
        assert_eq!("pretty".parse::<LogFormat>().ok(), Some(LogFormat::Pretty));
        assert_eq!("nonsense".parse::<LogFormat>().ok(), Some(LogFormat::Compact));
    }
}
