use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::wire::Action;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6009
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessConfig {
    /// Interval between in-band ping frames while a session is active.
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// How long a ping may go unanswered before the tick counts as a failure.
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
    /// Consecutive failed ticks before the session is evicted.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Sessions with no activity for this long are swept into eviction.
    #[serde(default = "default_stale_session_ms")]
    pub stale_session_ms: u64,
    /// Cadence of the shared stale-session sweep.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Budget for enqueueing one frame onto a session writer.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

fn default_ping_interval_ms() -> u64 {
    10_000
}

fn default_ping_timeout_ms() -> u64 {
    5_000
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_stale_session_ms() -> u64 {
    30_000
}

fn default_sweep_interval_ms() -> u64 {
    30_000
}

fn default_write_timeout_ms() -> u64 {
    2_000
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: default_ping_interval_ms(),
            ping_timeout_ms: default_ping_timeout_ms(),
            failure_threshold: default_failure_threshold(),
            stale_session_ms: default_stale_session_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl LivenessConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn stale_session(&self) -> Duration {
        Duration::from_millis(self.stale_session_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutsConfig {
    #[serde(default = "default_action_timeout_secs")]
    pub default_secs: u64,
    #[serde(default = "default_dom_snapshot_secs")]
    pub dom_snapshot_secs: u64,
    #[serde(default = "default_accessibility_secs")]
    pub accessibility_secs: u64,
    /// Caller-supplied overrides are clamped into [minSecs, maxSecs].
    #[serde(default = "default_min_secs")]
    pub min_secs: u64,
    #[serde(default = "default_max_secs")]
    pub max_secs: u64,
}

fn default_action_timeout_secs() -> u64 {
    10
}

fn default_dom_snapshot_secs() -> u64 {
    20
}

fn default_accessibility_secs() -> u64 {
    30
}

fn default_min_secs() -> u64 {
    5
}

fn default_max_secs() -> u64 {
    120
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            default_secs: default_action_timeout_secs(),
            dom_snapshot_secs: default_dom_snapshot_secs(),
            accessibility_secs: default_accessibility_secs(),
            min_secs: default_min_secs(),
            max_secs: default_max_secs(),
        }
    }
}

impl TimeoutsConfig {
    /// Deadline for one action round-trip. A caller override (milliseconds)
    /// wins over the per-action default, clamped into [min, max].
    pub fn for_action(&self, action: Action, override_ms: Option<u64>) -> Duration {
        if let Some(ms) = override_ms {
            let clamped = ms.clamp(self.min_secs * 1000, self.max_secs * 1000);
            return Duration::from_millis(clamped);
        }
        let secs = match action {
            Action::GetAccessibilityTree => self.accessibility_secs,
            Action::GetDomSnapshot => self.dom_snapshot_secs,
            _ => self.default_secs,
        };
        Duration::from_secs(secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsConfig {
    #[serde(default = "default_max_html")]
    pub max_html: usize,
    #[serde(default = "default_max_text")]
    pub max_text: usize,
    #[serde(default = "default_max_dom_nodes")]
    pub max_dom_nodes: usize,
    #[serde(default = "default_max_dom_nodes_ceiling")]
    pub max_dom_nodes_ceiling: usize,
    #[serde(default = "default_max_request_body")]
    pub max_request_body: usize,
    #[serde(default = "default_max_response_body")]
    pub max_response_body: usize,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    #[serde(default = "default_cursor_ttl_secs")]
    pub cursor_ttl_secs: u64,
    #[serde(default = "default_console_buffer")]
    pub console_buffer: usize,
    #[serde(default = "default_network_buffer")]
    pub network_buffer: usize,
    #[serde(default = "default_debugger_buffer")]
    pub debugger_buffer: usize,
}

fn default_max_html() -> usize {
    50_000
}

fn default_max_text() -> usize {
    30_000
}

fn default_max_dom_nodes() -> usize {
    500
}

fn default_max_dom_nodes_ceiling() -> usize {
    2_000
}

fn default_max_request_body() -> usize {
    10_000
}

fn default_max_response_body() -> usize {
    10_000
}

fn default_page_size() -> usize {
    50
}

fn default_max_page_size() -> usize {
    200
}

fn default_cursor_ttl_secs() -> u64 {
    300
}

fn default_console_buffer() -> usize {
    1_000
}

fn default_network_buffer() -> usize {
    500
}

fn default_debugger_buffer() -> usize {
    100
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_html: default_max_html(),
            max_text: default_max_text(),
            max_dom_nodes: default_max_dom_nodes(),
            max_dom_nodes_ceiling: default_max_dom_nodes_ceiling(),
            max_request_body: default_max_request_body(),
            max_response_body: default_max_response_body(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            cursor_ttl_secs: default_cursor_ttl_secs(),
            console_buffer: default_console_buffer(),
            network_buffer: default_network_buffer(),
            debugger_buffer: default_debugger_buffer(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file when present, otherwise fall back to defaults.
    /// Environment overrides apply in both cases.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => Self::load(p)?,
            _ => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("TABBRIDGE_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("TABBRIDGE_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::Config("invalid TABBRIDGE_PORT".to_string()))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("server port cannot be 0".to_string()));
        }
        if self.timeouts.min_secs > self.timeouts.max_secs {
            return Err(Error::Config(
                "timeout minSecs cannot exceed maxSecs".to_string(),
            ));
        }
        if self.limits.max_dom_nodes > self.limits.max_dom_nodes_ceiling {
            return Err(Error::Config(
                "maxDomNodes cannot exceed maxDomNodesCeiling".to_string(),
            ));
        }
        if self.liveness.failure_threshold == 0 {
            return Err(Error::Config(
                "liveness failureThreshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 6009);
        assert_eq!(config.limits.max_html, 50_000);
        assert_eq!(config.limits.max_dom_nodes, 500);
        assert_eq!(config.liveness.failure_threshold, 3);
    }

    #[test]
    fn test_action_timeout_table() {
        let t = TimeoutsConfig::default();
        assert_eq!(
            t.for_action(Action::GetAccessibilityTree, None),
            Duration::from_secs(30)
        );
        assert_eq!(
            t.for_action(Action::GetDomSnapshot, None),
            Duration::from_secs(20)
        );
        assert_eq!(
            t.for_action(Action::GetPageContent, None),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_timeout_override_clamped() {
        let t = TimeoutsConfig::default();
        // Below the floor.
        assert_eq!(
            t.for_action(Action::GetAllTabs, Some(1_000)),
            Duration::from_secs(5)
        );
        // Above the ceiling.
        assert_eq!(
            t.for_action(Action::GetAllTabs, Some(300_000)),
            Duration::from_secs(120)
        );
        // In range.
        assert_eq!(
            t.for_action(Action::GetAllTabs, Some(7_500)),
            Duration::from_millis(7_500)
        );
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("pingIntervalMs"));
        assert!(json.contains("maxDomNodes"));
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.server.port, config.server.port);
        assert_eq!(back.limits.cursor_ttl_secs, 300);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"server":{"port":7001}}"#).unwrap();
        assert_eq!(config.server.port, 7001);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.liveness.ping_interval_ms, 10_000);
    }
}
