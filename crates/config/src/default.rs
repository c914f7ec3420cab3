use crate::config::{HealthCheck, Log};

// default values
pub fn get_default_port() -> u16 {
    8080
}

pub fn get_default_address() -> String {
    String::from("0.0.0.0")
}

pub fn get_default_liveness() -> String {
    String::from("always")
}

pub fn get_default_max_inflight() -> usize {
    64
}

pub fn get_default_drain_timeout_ms() -> u64 {
    5000
}

pub fn get_default_path() -> String {
    String::from("/health")
}

pub fn get_default_interval() -> u64 {
    5000
}

pub fn get_default_health_timeout() -> u64 {
    1000
}

pub fn get_default_failure_threshold() -> u32 {
    3
}

pub fn get_default_success_threshold() -> u32 {
    1
}

pub fn get_default_cooldown_ms() -> u64 {
    5000
}

pub fn get_default_health_check() -> HealthCheck {
    HealthCheck {
        path: get_default_path(),
        interval: get_default_interval(),
        timeout_ms: get_default_health_timeout(),
        failure_threshold: get_default_failure_threshold(),
        success_threshold: get_default_success_threshold(),
        cooldown_ms: get_default_cooldown_ms(),
    }
}

pub fn get_default_log_level() -> String {
    String::from("info")
}

pub fn get_default_log() -> Log {
    Log {
        level: get_default_log_level(),
        file: None,
    }
}
