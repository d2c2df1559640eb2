//! Server configuration.
//!
//! Read from a redis.conf-style file: one `directive value` pair per line,
//! `#` comments, optional double quotes around values.

use crate::{DEFAULT_PORT, MAX_CLIENTS};
use crate::cluster::{ClusterConfig, PoolConfig};
use crate::persistence::{AofFsync, DEFAULT_AOF_QUEUE, PersistenceConfig};
use crate::types::DEFAULT_DATABASES;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // === Server ===
    /// Bind address
    pub bind: String,
    /// Port number
    pub port: u16,
    /// Maximum number of clients
    pub max_clients: usize,
    /// Number of databases
    pub databases: usize,
    /// Working directory
    pub dir: PathBuf,
    /// Log level
    pub loglevel: LogLevel,
    /// How long shutdown waits for sessions to drain (`shutdown-timeout`)
    pub shutdown_timeout: Duration,

    // === Persistence ===
    /// Enable AOF persistence
    pub appendonly: bool,
    /// AOF filename, relative to `dir`
    pub appendfilename: String,
    /// AOF fsync policy
    pub appendfsync: AofFsync,
    /// Capacity of the queue in front of the AOF writer
    pub aof_queue_size: usize,

    // === Cluster ===
    /// This node's address as the other nodes know it
    pub self_addr: Option<String>,
    /// Addresses of the other nodes
    pub peers: Vec<String>,
    /// Connections kept per peer
    pub peer_pool_size: usize,
    /// Deadline for one relayed command, pool wait included (`relay-timeout`)
    pub relay_timeout: Duration,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Everything, including per-command traces
    Debug,
    /// Connection lifecycle and command failures
    Verbose,
    /// Startup, shutdown and notable events
    #[default]
    Notice,
    /// Problems only
    Warning,
}

impl LogLevel {
    /// Parse a redis.conf log level.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "verbose" => Some(Self::Verbose),
            "notice" => Some(Self::Notice),
            "warning" => Some(Self::Warning),
            _ => None,
        }
    }

    /// The matching `tracing` filter directive.
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Verbose => "debug",
            Self::Notice => "info",
            Self::Warning => "warn",
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            max_clients: MAX_CLIENTS,
            databases: DEFAULT_DATABASES,
            dir: PathBuf::from("."),
            loglevel: LogLevel::default(),
            shutdown_timeout: Duration::from_secs(30),
            appendonly: false,
            appendfilename: "appendonly.aof".to_string(),
            appendfsync: AofFsync::default(),
            aof_queue_size: DEFAULT_AOF_QUEUE,
            self_addr: None,
            peers: Vec::new(),
            peer_pool_size: 16,
            relay_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set max clients.
    pub fn max_clients(mut self, max: usize) -> Self {
        self.max_clients = max;
        self
    }

    /// Enable AOF persistence.
    pub fn appendonly(mut self, enabled: bool) -> Self {
        self.appendonly = enabled;
        self
    }

    /// Join a cluster as `self_addr` alongside `peers`.
    pub fn cluster(mut self, self_addr: impl Into<String>, peers: Vec<String>) -> Self {
        self.self_addr = Some(self_addr.into());
        self.peers = peers;
        self
    }

    /// Address to listen on.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Whether this node routes commands across a cluster.
    pub fn cluster_enabled(&self) -> bool {
        self.self_addr.as_deref().is_some_and(|s| !s.is_empty()) && !self.peers.is_empty()
    }

    /// Full path of the AOF.
    pub fn aof_path(&self) -> PathBuf {
        self.dir.join(&self.appendfilename)
    }

    /// Persistence settings derived from this configuration.
    pub fn persistence(&self) -> PersistenceConfig {
        PersistenceConfig {
            aof_enabled: self.appendonly,
            aof_path: self.aof_path(),
            aof_fsync: self.appendfsync,
            aof_queue: self.aof_queue_size,
        }
    }

    /// Cluster settings, if this node has peers.
    pub fn cluster_config(&self) -> Option<ClusterConfig> {
        if !self.cluster_enabled() {
            return None;
        }
        Some(ClusterConfig {
            self_id: self.self_addr.clone().unwrap_or_default(),
            peers: self.peers.clone(),
            pool: PoolConfig {
                max_size: self.peer_pool_size,
                borrow_timeout: self.relay_timeout,
                ..PoolConfig::default()
            },
            relay_timeout: self.relay_timeout,
        })
    }

    /// Load configuration from a file (redis.conf compatible format).
    ///
    /// # Format
    /// ```text
    /// # Comment
    /// directive value
    /// directive "value with spaces"
    /// ```
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (directive, value) =
                Self::parse_line(line).ok_or_else(|| ConfigError::ParseError {
                    line: line_num + 1,
                    message: "Invalid directive format".to_string(),
                })?;

            config.apply_directive(&directive.to_lowercase(), value, line_num + 1)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a single config line into directive and value.
    fn parse_line(line: &str) -> Option<(&str, &str)> {
        let mut parts = line.splitn(2, char::is_whitespace);
        let directive = parts.next()?.trim();
        let value = parts.next().map_or("", str::trim);

        // Handle quoted values
        let value = if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            &value[1..value.len() - 1]
        } else {
            value
        };

        Some((directive, value))
    }

    /// Apply a single directive to the config.
    fn apply_directive(
        &mut self,
        directive: &str,
        value: &str,
        line: usize,
    ) -> Result<(), ConfigError> {
        match directive {
            // Server
            "bind" => self.bind = value.to_string(),
            "port" => self.port = parse_number(value, line)?,
            "maxclients" => self.max_clients = parse_number(value, line)?,
            "databases" => self.databases = parse_number(value, line)?,
            "dir" => self.dir = PathBuf::from(value),
            "loglevel" => {
                self.loglevel = LogLevel::parse(value).ok_or_else(|| ConfigError::ParseError {
                    line,
                    message: format!("Invalid log level: {value}"),
                })?;
            }
            "shutdown-timeout" => {
                self.shutdown_timeout = parse_duration(value, line)?;
            }

            // Persistence
            "appendonly" => self.appendonly = parse_bool(value, line)?,
            "appendfilename" => self.appendfilename = value.to_string(),
            "appendfsync" => {
                self.appendfsync = AofFsync::parse(value).ok_or_else(|| ConfigError::ParseError {
                    line,
                    message: format!("Invalid appendfsync: {value}"),
                })?;
            }
            "aof-queue-size" => self.aof_queue_size = parse_number(value, line)?,

            // Cluster
            "self" => {
                self.self_addr = (!value.is_empty()).then(|| value.to_string());
            }
            "peers" => {
                self.peers = value
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "peer-pool-size" => self.peer_pool_size = parse_number(value, line)?,
            "relay-timeout" => {
                self.relay_timeout = parse_duration(value, line)?;
            }

            // Unknown directive - ignore for forward compatibility
            _ => {
                tracing::warn!("Unknown config directive at line {}: {}", line, directive);
            }
        }

        Ok(())
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.databases == 0 {
            return Err(ConfigError::Invalid("databases must be at least 1".to_string()));
        }
        if self.peer_pool_size == 0 {
            return Err(ConfigError::Invalid("peer-pool-size must be at least 1".to_string()));
        }
        if !self.peers.is_empty() && self.self_addr.is_none() {
            return Err(ConfigError::Invalid("peers are set but self is not".to_string()));
        }
        Ok(())
    }
}

/// Configuration parsing error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading config file.
    #[error("Config I/O error: {0}")]
    IoError(String),
    /// Parse error in config file.
    #[error("Config error at line {line}: {message}")]
    ParseError {
        /// Line number, starting at 1
        line: usize,
        /// What was wrong with it
        message: String,
    },
    /// Settings that parse but do not fit together.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

// Helper functions for parsing

/// Parse a yes/no switch as used by `appendonly`.
pub fn parse_yes_no(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_bool(value: &str, line: usize) -> Result<bool, ConfigError> {
    parse_yes_no(value).ok_or_else(|| ConfigError::ParseError {
        line,
        message: format!("Invalid boolean: {value}"),
    })
}

/// Timeouts are whole seconds, or milliseconds with an `ms` suffix.
fn parse_duration(value: &str, line: usize) -> Result<Duration, ConfigError> {
    match value.strip_suffix("ms") {
        Some(millis) => parse_number(millis, line).map(Duration::from_millis),
        None => parse_number(value.strip_suffix('s').unwrap_or(value), line)
            .map(Duration::from_secs),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, line: usize) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::ParseError {
        line,
        message: format!("Invalid number: {value}"),
    })
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config_str = r#"
# Test config
bind 0.0.0.0
port 6380
maxclients 1000
databases 4
appendonly yes
appendfilename "data.aof"
appendfsync always
dir /var/lib/ringstore
loglevel verbose
"#;

        let config = Config::parse(config_str).unwrap();
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 6380);
        assert_eq!(config.max_clients, 1000);
        assert_eq!(config.databases, 4);
        assert!(config.appendonly);
        assert_eq!(config.appendfsync, AofFsync::Always);
        assert_eq!(config.aof_path(), PathBuf::from("/var/lib/ringstore/data.aof"));
        assert_eq!(config.loglevel, LogLevel::Verbose);
        assert!(!config.cluster_enabled());
    }

    #[test]
    fn test_parse_cluster() {
        let config = Config::parse(
            "self 127.0.0.1:6399\npeers 127.0.0.1:6400, 127.0.0.1:6401\nrelay-timeout 250ms\n",
        )
        .unwrap();
        assert_eq!(config.self_addr.as_deref(), Some("127.0.0.1:6399"));
        assert_eq!(config.peers, vec!["127.0.0.1:6400", "127.0.0.1:6401"]);
        assert_eq!(config.relay_timeout, Duration::from_millis(250));
        assert!(config.cluster_enabled());
    }

    #[test]
    fn test_timeouts_share_units() {
        let config = Config::parse("shutdown-timeout 10\nrelay-timeout 2\n").unwrap();
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
        assert_eq!(config.relay_timeout, Duration::from_secs(2));

        let config = Config::parse("shutdown-timeout 1500ms\nrelay-timeout 3s\n").unwrap();
        assert_eq!(config.shutdown_timeout, Duration::from_millis(1500));
        assert_eq!(config.relay_timeout, Duration::from_secs(3));

        assert!(matches!(
            Config::parse("relay-timeout fast\n"),
            Err(ConfigError::ParseError { line: 1, .. })
        ));
    }

    #[test]
    fn test_log_level_filters() {
        assert_eq!(LogLevel::Debug.as_filter(), "debug");
        assert_eq!(LogLevel::Verbose.as_filter(), "debug");
        assert_eq!(LogLevel::Notice.as_filter(), "info");
        assert_eq!(LogLevel::Warning.as_filter(), "warn");
    }

    #[test]
    fn test_self_without_peers_is_standalone() {
        let config = Config::parse("self 127.0.0.1:6399\n").unwrap();
        assert!(!config.cluster_enabled());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::parse("port http\n"),
            Err(ConfigError::ParseError { line: 1, .. })
        ));
        assert!(matches!(
            Config::parse("# c\nappendfsync sometimes\n"),
            Err(ConfigError::ParseError { line: 2, .. })
        ));
        assert!(matches!(
            Config::parse("databases 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::parse("peers 127.0.0.1:1\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_unknown_directive_is_ignored() {
        let config = Config::parse("save 900 1\nport 7000\n").unwrap();
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("yes", 1).unwrap());
        assert!(parse_bool("true", 1).unwrap());
        assert!(parse_bool("1", 1).unwrap());
        assert!(!parse_bool("no", 1).unwrap());
        assert!(!parse_bool("false", 1).unwrap());
        assert!(!parse_bool("0", 1).unwrap());
        assert!(parse_bool("maybe", 1).is_err());
    }
}
