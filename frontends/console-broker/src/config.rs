use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_TOKEN_TTL_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("application {application} lists unknown server {hostname}")]
    UnknownServer {
        application: String,
        hostname: String,
    },
    #[error("duplicate server id {0}")]
    DuplicateServer(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_ttl")]
    pub token_ttl_secs: u64,
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    #[serde(default)]
    pub applications: Vec<ApplicationConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub id: String,
    pub hostname: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub user: String,
    /// argv opening a shell on the server; empty means the broker's `$SHELL`.
    #[serde(default)]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationConfig {
    pub id: String,
    pub name: String,
    /// Hostnames of the servers running the application.
    #[serde(default)]
    pub servers: Vec<String>,
    /// Appended to the server command to enter the application.
    #[serde(default)]
    pub exec: Vec<String>,
}

fn default_ttl() -> u64 {
    DEFAULT_TOKEN_TTL_SECS
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            servers: Vec::new(),
            applications: Vec::new(),
        }
    }
}

impl BrokerConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("console-broker").join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let config: BrokerConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (i, server) in self.servers.iter().enumerate() {
            if self.servers[..i].iter().any(|s| s.id == server.id) {
                return Err(ConfigError::DuplicateServer(server.id.clone()));
            }
        }
        for app in &self.applications {
            for hostname in &app.servers {
                if self.server_by_hostname(hostname).is_none() {
                    return Err(ConfigError::UnknownServer {
                        application: app.id.clone(),
                        hostname: hostname.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn server(&self, id: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.id == id)
    }

    pub fn server_by_hostname(&self, hostname: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.hostname == hostname)
    }

    pub fn application(&self, id: &str) -> Option<&ApplicationConfig> {
        self.applications.iter().find(|a| a.id == id)
    }
}

impl ServerConfig {
    /// Program and arguments for a shell on this server.
    pub fn argv(&self) -> Vec<String> {
        if self.command.is_empty() {
            vec![std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())]
        } else {
            self.command.clone()
        }
    }

    pub fn host_info(&self) -> console_protocol::types::HostInfo {
        console_protocol::types::HostInfo {
            ip: self.ip.clone(),
            user: self.user.clone(),
            hostname: self.hostname.clone(),
        }
    }
}
