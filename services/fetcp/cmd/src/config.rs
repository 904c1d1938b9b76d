//! Configuration handling for the fetcp binary.
//!
//! Values come from the `server:` section of a YAML file, then from
//! `FETCP_*` environment variables. Anything not set keeps the
//! [`ServerConfig`] default.

use anyhow::Result;
use fetcp_session::ServerConfig;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Server settings as they appear on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    /// Label used in log lines
    pub name: String,
    /// Interface to listen on
    pub listen_ip: IpAddr,
    /// TCP port to listen on
    pub port: u16,
    /// Outbound queue capacity per connection
    pub send_queue_capacity: usize,
    /// Inbound queue capacity per connection
    pub receive_queue_capacity: usize,
    /// Idle threshold (seconds)
    pub keep_alive_secs: u64,
    /// Heartbeat checking for new connections
    pub heartbeat: bool,
    /// Heartbeat check interval (seconds)
    pub heartbeat_interval_secs: u64,
    /// Upper bound on one accept wait (milliseconds)
    pub accept_poll_ms: u64,
}

impl Default for FileConfig {
    fn default() -> Self {
        let defaults = ServerConfig::default();
        Self {
            name: defaults.name,
            listen_ip: defaults.listen_ip,
            port: defaults.port,
            send_queue_capacity: defaults.send_queue_capacity,
            receive_queue_capacity: defaults.receive_queue_capacity,
            keep_alive_secs: defaults.keep_alive.as_secs(),
            heartbeat: defaults.heartbeat,
            heartbeat_interval_secs: defaults.heartbeat_interval.as_secs(),
            accept_poll_ms: defaults.accept_poll_interval.as_millis() as u64,
        }
    }
}

/// Root of the YAML document
#[derive(Debug, Deserialize)]
struct RootConfig {
    server: Option<ServerSection>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    name: Option<String>,
    listen_ip: Option<IpAddr>,
    port: Option<u16>,
    send_queue_capacity: Option<usize>,
    receive_queue_capacity: Option<usize>,
    keep_alive_secs: Option<u64>,
    heartbeat: Option<bool>,
    heartbeat_interval_secs: Option<u64>,
    accept_poll_ms: Option<u64>,
}

impl FileConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = Self::default();
        let path = config_path.as_ref();

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root) => {
                    if let Some(section) = root.server {
                        config.apply_server_section(section);
                    }
                    info!("Loaded configuration from {:?}", path);
                }
                Err(e) => warn!("Failed to parse config file {:?} ({}), using defaults", path, e),
            },
            Err(_) => warn!("Config file {:?} not found, using defaults", path),
        }

        config.apply_environment_overrides(|key| std::env::var(key).ok());

        info!(
            "Final server configuration: name={}, listen={}:{}, heartbeat={}, keep_alive={}s",
            config.name, config.listen_ip, config.port, config.heartbeat, config.keep_alive_secs
        );

        Ok(config)
    }

    fn apply_server_section(&mut self, section: ServerSection) {
        if let Some(name) = section.name {
            self.name = name;
        }
        if let Some(listen_ip) = section.listen_ip {
            self.listen_ip = listen_ip;
        }
        if let Some(port) = section.port {
            self.port = port;
        }
        if let Some(capacity) = section.send_queue_capacity {
            self.send_queue_capacity = capacity;
        }
        if let Some(capacity) = section.receive_queue_capacity {
            self.receive_queue_capacity = capacity;
        }
        if let Some(secs) = section.keep_alive_secs {
            self.keep_alive_secs = secs;
        }
        if let Some(heartbeat) = section.heartbeat {
            self.heartbeat = heartbeat;
        }
        if let Some(secs) = section.heartbeat_interval_secs {
            self.heartbeat_interval_secs = secs;
        }
        if let Some(ms) = section.accept_poll_ms {
            self.accept_poll_ms = ms;
        }
    }

    /// Apply `FETCP_*` overrides; unparsable values are ignored with a warning
    fn apply_environment_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("FETCP_PORT") {
            match port.parse::<u16>() {
                Ok(port) => {
                    self.port = port;
                    info!("Port overridden by environment: {}", port);
                }
                Err(_) => warn!("Ignoring invalid FETCP_PORT: {}", port),
            }
        }

        if let Some(heartbeat) = lookup("FETCP_HEARTBEAT") {
            match parse_bool(&heartbeat) {
                Some(enabled) => {
                    self.heartbeat = enabled;
                    info!("Heartbeat overridden by environment: {}", enabled);
                }
                None => warn!("Ignoring invalid FETCP_HEARTBEAT: {}", heartbeat),
            }
        }

        if let Some(keep_alive) = lookup("FETCP_KEEP_ALIVE_SECS") {
            match keep_alive.parse::<u64>() {
                Ok(secs) => {
                    self.keep_alive_secs = secs;
                    info!("Keep-alive overridden by environment: {}s", secs);
                }
                Err(_) => warn!("Ignoring invalid FETCP_KEEP_ALIVE_SECS: {}", keep_alive),
            }
        }

        if let Some(name) = lookup("FETCP_SERVER_NAME") {
            self.name = name;
            info!("Server name overridden by environment: {}", self.name);
        }
    }

    /// Convert into the engine's configuration
    pub fn into_server_config(self) -> ServerConfig {
        ServerConfig::default()
            .with_name(self.name)
            .with_listen_ip(self.listen_ip)
            .with_port(self.port)
            .with_send_queue_capacity(self.send_queue_capacity)
            .with_receive_queue_capacity(self.receive_queue_capacity)
            .with_keep_alive(Duration::from_secs(self.keep_alive_secs))
            .with_heartbeat(self.heartbeat)
            .with_heartbeat_interval(Duration::from_secs(self.heartbeat_interval_secs))
            .with_accept_poll_interval(Duration::from_millis(self.accept_poll_ms))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = FileConfig::default();
        assert_eq!(config.port, 9000);
        assert_eq!(config.keep_alive_secs, 300);
        assert!(!config.heartbeat);
        assert_eq!(config.into_server_config(), ServerConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let yaml_content = r#"
server:
  name: lobby
  listen_ip: 127.0.0.1
  port: 7100
  send_queue_capacity: 64
  keep_alive_secs: 30
  heartbeat: true
  heartbeat_interval_secs: 2
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = FileConfig::load_from_file(temp_file.path()).unwrap();

        assert_eq!(config.name, "lobby");
        assert_eq!(config.listen_ip.to_string(), "127.0.0.1");
        assert_eq!(config.send_queue_capacity, 64);
        assert_eq!(config.receive_queue_capacity, 4096);
        assert!(config.heartbeat);

        let server = config.into_server_config();
        assert_eq!(server.keep_alive, Duration::from_secs(30));
        assert_eq!(server.heartbeat_interval, Duration::from_secs(2));
        assert_eq!(server.accept_poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig::load_from_file(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.name, "fetcp");
        assert_eq!(config.send_queue_capacity, 4096);
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"server: [not, a, map").unwrap();

        let config = FileConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.keep_alive_secs, 300);
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("FETCP_PORT", "7200"),
            ("FETCP_HEARTBEAT", "yes"),
            ("FETCP_KEEP_ALIVE_SECS", "nope"),
            ("FETCP_SERVER_NAME", "edge"),
        ]
        .into_iter()
        .collect();

        let mut config = FileConfig::default();
        config.apply_environment_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.port, 7200);
        assert!(config.heartbeat);
        assert_eq!(config.keep_alive_secs, 300);
        assert_eq!(config.name, "edge");
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
