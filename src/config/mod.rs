use crate::access::ConfigPaths;
use crate::forward::ForwardTarget;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Complete gatekeeper configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatekeeperConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub wake: WakeConfig,
    #[serde(default)]
    pub forward: ForwardConfig,
}

/// HTTP listener and identity of the guarded asset
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Asset this instance guards (required)
    #[serde(default)]
    pub asset_id: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_listen_port() -> u16 {
    8081
}

fn default_max_body_bytes() -> usize {
    1_048_576 // 1 MB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            asset_id: String::new(),
            listen_port: default_listen_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Local agent that receives authorized traffic
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_host")]
    pub host: String,
    #[serde(default = "default_agent_port")]
    pub port: u16,
}

fn default_agent_host() -> String {
    "localhost".to_string()
}

fn default_agent_port() -> u16 {
    8080
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: default_agent_host(),
            port: default_agent_port(),
        }
    }
}

/// Fleet coordinator; also handles tracked assets unless `tracked_url` is set
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "default_coordinator_host")]
    pub host: String,
    #[serde(default = "default_coordinator_port")]
    pub port: u16,
    #[serde(default)]
    pub tracked_url: Option<String>,
}

fn default_coordinator_host() -> String {
    "fleetclaw-fleet-coord".to_string()
}

fn default_coordinator_port() -> u16 {
    8080
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            host: default_coordinator_host(),
            port: default_coordinator_port(),
            tracked_url: None,
        }
    }
}

/// User registry and permission matrix documents
#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    #[serde(default = "default_users_file")]
    pub users_file: PathBuf,
    #[serde(default = "default_permissions_file")]
    pub permissions_file: PathBuf,
    #[serde(default = "default_reload_debounce_ms")]
    pub reload_debounce_ms: u64,
}

fn default_users_file() -> PathBuf {
    PathBuf::from("/app/config/users.yaml")
}

fn default_permissions_file() -> PathBuf {
    PathBuf::from("/app/config/permissions.yaml")
}

fn default_reload_debounce_ms() -> u64 {
    100
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            users_file: default_users_file(),
            permissions_file: default_permissions_file(),
            reload_debounce_ms: default_reload_debounce_ms(),
        }
    }
}

/// Lifecycle store. Lifecycle routing is off when `redis_url` is unset.
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_wake_buffer_ttl")]
    pub wake_buffer_ttl_seconds: u64,
}

fn default_wake_buffer_ttl() -> u64 {
    300
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            wake_buffer_ttl_seconds: default_wake_buffer_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WakeConfig {
    #[serde(default = "default_compose_file")]
    pub compose_file: PathBuf,
    #[serde(default = "default_container_prefix")]
    pub container_prefix: String,
}

fn default_compose_file() -> PathBuf {
    PathBuf::from("/app/config/docker-compose.yml")
}

fn default_container_prefix() -> String {
    "fleetclaw-".to_string()
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            compose_file: default_compose_file(),
            container_prefix: default_container_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForwardConfig {
    #[serde(default = "default_forward_timeout")]
    pub timeout_seconds: u64,
}

fn default_forward_timeout() -> u64 {
    30
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_forward_timeout(),
        }
    }
}

impl GatekeeperConfig {
    /// Defaults, then the TOML file named by `GATEKEEPER_CONFIG` (if any),
    /// then environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("GATEKEEPER_CONFIG") {
            Ok(path) => load_config(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override fields from environment-style lookups.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = non_empty("ASSET_ID") {
            self.server.asset_id = v;
        }
        if let Some(n) = non_empty("GATEKEEPER_PORT").and_then(|v| v.parse().ok()) {
            self.server.listen_port = n;
        }
        if let Some(n) = non_empty("AGENT_PORT").and_then(|v| v.parse().ok()) {
            self.agent.port = n;
        }
        if let Some(v) = non_empty("FC_HOST") {
            self.coordinator.host = v;
        }
        if let Some(n) = non_empty("FC_PORT").and_then(|v| v.parse().ok()) {
            self.coordinator.port = n;
        }
        if let Some(v) = non_empty("USERS_FILE") {
            self.access.users_file = PathBuf::from(v);
        }
        if let Some(v) = non_empty("PERMISSIONS_FILE") {
            self.access.permissions_file = PathBuf::from(v);
        }
        if let Some(v) = non_empty("REDIS_URL") {
            self.lifecycle.redis_url = Some(v);
        }
        if let Some(v) = non_empty("COMPOSE_FILE") {
            self.wake.compose_file = PathBuf::from(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.asset_id.trim().is_empty() {
            bail!("ASSET_ID environment variable required");
        }
        if self.forward.timeout_seconds == 0 {
            bail!("forward.timeout_seconds must be greater than zero");
        }
        if self.lifecycle.wake_buffer_ttl_seconds == 0 {
            bail!("lifecycle.wake_buffer_ttl_seconds must be greater than zero");
        }
        Ok(())
    }

    pub fn access_paths(&self) -> ConfigPaths {
        ConfigPaths::new(&self.access.users_file, &self.access.permissions_file)
    }

    pub fn agent_target(&self) -> ForwardTarget {
        ForwardTarget::webhook("agent", &self.agent.host, self.agent.port)
    }

    pub fn tracked_target(&self) -> ForwardTarget {
        match &self.coordinator.tracked_url {
            Some(url) => ForwardTarget::new("FC", url.clone()),
            None => ForwardTarget::webhook("FC", &self.coordinator.host, self.coordinator.port),
        }
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.forward.timeout_seconds)
    }

    pub fn wake_buffer_ttl(&self) -> Duration {
        Duration::from_secs(self.lifecycle.wake_buffer_ttl_seconds)
    }

    pub fn reload_debounce(&self) -> Duration {
        Duration::from_millis(self.access.reload_debounce_ms)
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<GatekeeperConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: GatekeeperConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", path))?;
    Ok(config)
}
