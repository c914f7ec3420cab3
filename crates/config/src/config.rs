use serde::{Deserialize, Serialize};

use crate::default::{
    get_default_address, get_default_cooldown_ms, get_default_drain_timeout_ms,
    get_default_failure_threshold, get_default_health_check, get_default_health_timeout,
    get_default_interval, get_default_liveness, get_default_log, get_default_log_level,
    get_default_max_inflight, get_default_path, get_default_port, get_default_success_threshold,
};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub listen: Listen,

    // rotation order = list order
    #[serde(default)]
    pub backends: Vec<Backend>,

    #[serde(default = "get_default_liveness")]
    pub liveness: String, // "always" | "probed"

    #[serde(default = "get_default_health_check")]
    pub health_check: HealthCheck,

    #[serde(default = "get_default_max_inflight")]
    pub max_inflight: usize,

    // grace period for open connections after shutdown starts
    #[serde(default = "get_default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    #[serde(default = "get_default_log")]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: Listen::default(),
            backends: Vec::new(),
            liveness: get_default_liveness(),
            health_check: get_default_health_check(),
            max_inflight: get_default_max_inflight(),
            drain_timeout_ms: get_default_drain_timeout_ms(),
            log: get_default_log(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Listen {
    #[serde(default = "get_default_address")]
    pub address: String, // "0.0.0.0"

    #[serde(default = "get_default_port")]
    pub port: u16, // 8080
}

impl Default for Listen {
    fn default() -> Self {
        Self {
            address: get_default_address(),
            port: get_default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Backend {
    Simple(String),
    Full { address: String },
}

impl Backend {
    pub fn address(&self) -> &str {
        match self {
            Backend::Simple(address) => address,
            Backend::Full { address } => address,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HealthCheck {
    #[serde(default = "get_default_path")]
    pub path: String, // "/health"

    #[serde(default = "get_default_interval")]
    pub interval: u64, // milliseconds

    #[serde(default = "get_default_health_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "get_default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "get_default_success_threshold")]
    pub success_threshold: u32,

    #[serde(default = "get_default_cooldown_ms")]
    pub cooldown_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Log {
    #[serde(default = "get_default_log_level")]
    pub level: String, // "trace, debug, info, warn, error, off"

    #[serde(default)]
    pub file: Option<String>,
}

impl Config {
    pub fn is_probed(&self) -> bool {
        self.liveness.eq_ignore_ascii_case("probed")
    }

    pub fn backend_addresses(&self) -> Vec<String> {
        self.backends
            .iter()
            .map(|backend| backend.address().to_string())
            .collect()
    }
}
