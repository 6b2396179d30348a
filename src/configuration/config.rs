use super::types::*;
use crate::error_handling::types::ConfigError;
use crate::event_store::KeyRetention;
use clap::Parser;
use log::{debug, info};
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lower bound for the pause between two live-feed connection attempts.
pub const MIN_RECONNECT_DELAY_MS: u64 = 100;

/// Command-line arguments.
///
/// Every flag is optional: values given here override the configuration file, which in
/// turn overrides the built-in defaults. Each flag can also be supplied through its
/// `INTERACT_MONITOR_*` environment variable.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "interact-monitor")]
#[command(version)]
#[command(about = "Live dashboard for interactions captured by an interactsh client")]
pub struct CliArgs {
    /// Path to a TOML configuration file
    #[arg(env = "INTERACT_MONITOR_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Origin of the capture backend, e.g. `http://127.0.0.1:5000`
    #[arg(long, env = "INTERACT_MONITOR_BACKEND")]
    pub backend_url: Option<String>,

    /// Address the dashboard binds to
    #[arg(long, env = "INTERACT_MONITOR_BIND")]
    pub bind_address: Option<String>,

    /// Port the dashboard listens on
    #[arg(long, env = "INTERACT_MONITOR_PORT")]
    pub port: Option<u16>,

    /// Maximum number of events kept in memory
    #[arg(long, env = "INTERACT_MONITOR_RETENTION_CAP")]
    pub retention_cap: Option<usize>,

    /// `retain` or `purge` identity keys of evicted events
    #[arg(long, value_parser = parse_key_retention)]
    pub key_retention: Option<KeyRetention>,
}

fn parse_key_retention(value: &str) -> Result<KeyRetention, String> {
    match value.to_ascii_lowercase().as_str() {
        "retain" => Ok(KeyRetention::Retain),
        "purge" => Ok(KeyRetention::Purge),
        other => Err(format!("expected `retain` or `purge`, got `{}`", other)),
    }
}

/// Application configuration.
///
/// # Fields Overview
///
/// - `backend`: base URL and endpoint paths of the capture backend, plus the optional
///   body forwarded with start/restart
/// - `web_ui`: bind address, port and title of the served dashboard
/// - `stream`: retention cap, evicted-key policy, reconnect delay and payload pattern
/// - `status`: status polling interval
///
/// Every section and field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub web_ui: WebUiConfig,
    pub stream: StreamConfig,
    pub status: StatusConfig,
}

impl Config {
    /// Reads a TOML configuration file. Validation is left to the caller, since CLI
    /// overrides may still fix individual values.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Reading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses TOML without validating it.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Builds the effective configuration: file (if any), then CLI overrides.
    pub fn load(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config_file {
            Some(path) => Self::from_file(path)?,
            None => {
                info!("No configuration file given, using defaults");
                Self::default()
            }
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    fn apply_args(&mut self, args: &CliArgs) {
        if let Some(url) = &args.backend_url {
            debug!("Backend URL overridden to {}", url);
            self.backend.base_url = url.clone();
        }
        if let Some(bind) = &args.bind_address {
            self.web_ui.bind_address = bind.clone();
        }
        if let Some(port) = args.port {
            self.web_ui.port = port;
        }
        if let Some(cap) = args.retention_cap {
            self.stream.retention_cap = cap;
        }
        if let Some(policy) = args.key_retention {
            self.stream.key_retention = policy;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = Url::parse(&self.backend.base_url)
            .map_err(|e| ConfigError::BadUrl(format!("{}: {}", self.backend.base_url, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::BadUrl(format!(
                "{}: scheme must be http or https",
                self.backend.base_url
            )));
        }

        for path in [
            &self.backend.history_path,
            &self.backend.status_path,
            &self.backend.stream_path,
            &self.backend.start_path,
            &self.backend.stop_path,
            &self.backend.restart_path,
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::BadUrl(format!(
                    "endpoint path `{}` must start with `/`",
                    path
                )));
            }
        }

        self.web_ui
            .bind_address
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::BadIPFormatting(format!("{}: {}", self.web_ui.bind_address, e)))?;

        if self.stream.retention_cap == 0 {
            return Err(ConfigError::NotInRange(
                "stream.retention_cap must be at least 1".to_string(),
            ));
        }
        if self.status.poll_interval_secs == 0 {
            return Err(ConfigError::NotInRange(
                "status.poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.stream.reconnect_delay_ms < MIN_RECONNECT_DELAY_MS {
            return Err(ConfigError::NotInRange(format!(
                "stream.reconnect_delay_ms must be at least {}",
                MIN_RECONNECT_DELAY_MS
            )));
        }
        if self.backend.request_timeout_secs == 0 {
            return Err(ConfigError::NotInRange(
                "backend.request_timeout_secs must be at least 1".to_string(),
            ));
        }

        self.payload_pattern()?;
        Ok(())
    }

    pub fn payload_pattern(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.stream.payload_host_pattern)
            .map_err(|e| ConfigError::BadPattern(e.to_string()))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.stream.reconnect_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.status.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args_under_test(extra: &[&str]) -> Result<CliArgs, clap::Error> {
        let mut argv = vec!["interact-monitor"];
        argv.extend_from_slice(extra);
        CliArgs::try_parse_from(argv)
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.stream.retention_cap, 500);
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = Config::from_toml_str(
            r#"
            [backend]
            base_url = "http://10.0.0.5:5000"

            [backend.control]
            server = "https://oast.pro"

            [stream]
            key_retention = "purge"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend.base_url, "http://10.0.0.5:5000");
        assert_eq!(config.backend.history_path, "/api/last");
        assert_eq!(config.backend.control.server.as_deref(), Some("https://oast.pro"));
        assert_eq!(config.stream.key_retention, KeyRetention::Purge);
        assert_eq!(config.stream.retention_cap, 500);
    }

    #[test]
    fn from_file_reads_the_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[web_ui]\nport = 9999").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.web_ui.port, 9999);
    }

    #[test]
    #[serial]
    fn load_validates_after_overrides() {
        let mut bad = NamedTempFile::new().unwrap();
        writeln!(bad, "[stream]\nretention_cap = 0").unwrap();
        let path = bad.path().to_string_lossy().to_string();

        let args = args_under_test(&[path.as_str()]).unwrap_or_else(|e| panic!("{}", e));
        assert!(matches!(
            Config::load(&args),
            Err(ConfigError::NotInRange(_))
        ));

        let args = args_under_test(&[path.as_str(), "--retention-cap", "10"])
            .unwrap_or_else(|e| panic!("{}", e));
        assert_eq!(Config::load(&args).unwrap().stream.retention_cap, 10);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = Config::from_file(Path::new("/nonexistent/interact-monitor.toml"));
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = Config::default();
        config.backend.base_url = "ftp://example.com".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::BadUrl(_))));

        let mut config = Config::default();
        config.backend.stream_path = "stream".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::BadUrl(_))));

        let mut config = Config::default();
        config.web_ui.bind_address = "localhost:80".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::BadIPFormatting(_))));

        let mut config = Config::default();
        config.stream.reconnect_delay_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NotInRange(_))));
        config.stream.reconnect_delay_ms = MIN_RECONNECT_DELAY_MS;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.stream.payload_host_pattern = "(".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::BadPattern(_))));

        assert!(matches!(
            Config::from_toml_str("[stream\n"),
            Err(ConfigError::TomlError(_))
        ));
    }

    #[test]
    #[serial]
    fn cli_overrides_file_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[web_ui]\nport = 9000\n[stream]\nretention_cap = 50").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let args = args_under_test(&[
            path.as_str(),
            "--port",
            "9100",
            "--key-retention",
            "purge",
        ])
        .unwrap_or_else(|e| panic!("{}", e));
        let config = Config::load(&args).unwrap();

        assert_eq!(config.web_ui.port, 9100);
        assert_eq!(config.stream.retention_cap, 50);
        assert_eq!(config.stream.key_retention, KeyRetention::Purge);
    }

    #[test]
    #[serial]
    fn backend_url_can_come_from_the_environment() {
        std::env::set_var("INTERACT_MONITOR_BACKEND", "http://192.0.2.10:5000");
        let args = args_under_test(&[]);
        std::env::remove_var("INTERACT_MONITOR_BACKEND");

        let config = Config::load(&args.unwrap()).unwrap();
        assert_eq!(config.backend.base_url, "http://192.0.2.10:5000");
    }

    #[test]
    fn unknown_key_retention_is_refused() {
        assert!(args_under_test(&["--key-retention", "forever"]).is_err());
    }
}
