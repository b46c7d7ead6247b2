//! Configuration for Postdrop

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// SMTP configuration
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// DNS resolver configuration
    #[serde(default)]
    pub dns: DnsConfig,

    /// Delivery configuration
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname
    #[serde(default = "default_hostname")]
    pub hostname: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
        }
    }
}

fn default_hostname() -> String {
    "localhost".to_string()
}

/// SMTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Hostname for the SMTP banner
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Bind host
    #[serde(default = "default_smtp_host")]
    pub host: String,

    /// SMTP port (inbound)
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Maximum concurrent connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Connection idle timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Recipient domains accepted by RCPT TO; empty accepts any domain
    #[serde(default)]
    pub allowed_domains: Vec<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            host: default_smtp_host(),
            port: default_smtp_port(),
            max_connections: default_max_connections(),
            connection_timeout_secs: default_connection_timeout(),
            allowed_domains: Vec::new(),
        }
    }
}

fn default_smtp_host() -> String {
    "0.0.0.0".to_string()
}

fn default_smtp_port() -> u16 {
    2525
}

fn default_max_connections() -> usize {
    100
}

fn default_connection_timeout() -> u64 {
    300
}

/// DNS resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Per-lookup timeout in seconds
    #[serde(default = "default_dns_timeout")]
    pub timeout_secs: u64,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_dns_timeout(),
        }
    }
}

fn default_dns_timeout() -> u64 {
    5
}

/// Delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Directory where accepted messages and their verdicts are written
    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            spool_dir: default_spool_dir(),
        }
    }
}

fn default_spool_dir() -> PathBuf {
    PathBuf::from("/var/lib/postdrop/spool")
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from the default locations, falling back to defaults
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./postdrop.toml"),
            std::path::PathBuf::from("./config.toml"),
            std::path::PathBuf::from("/etc/postdrop/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }
}
