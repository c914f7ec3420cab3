use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use roundabout_config::config::HealthCheck;

/// Decides whether a target may receive traffic.
#[derive(Debug, Clone)]
pub enum Liveness {
    /// Every target is always eligible. No probing happens.
    Always,
    /// Eligibility follows the outcome of periodic health probes.
    Probed(Arc<Probe>),
}

impl Liveness {
    pub fn from_config(mode: &str, health_check: &HealthCheck) -> Result<Self, String> {
        let mode = mode.trim().to_lowercase();
        match mode.as_str() {
            "always" => Ok(Self::Always),
            "probed" => Ok(Self::Probed(Arc::new(Probe::new(health_check.clone())))),
            _ => Err(format!("unsupported liveness mode: {mode}")),
        }
    }

    pub fn is_alive(&self) -> bool {
        match self {
            Liveness::Always => true,
            Liveness::Probed(probe) => probe.is_alive(),
        }
    }

    pub fn probe(&self) -> Option<&Arc<Probe>> {
        match self {
            Liveness::Always => None,
            Liveness::Probed(probe) => Some(probe),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    BecameHealthy,
    BecameUnhealthy,
}

#[derive(Debug)]
enum HealthState {
    Healthy,
    Unhealthy { until: Instant, successes: u32 },
}

#[derive(Debug)]
struct ProbeState {
    consecutive_failures: u32,
    health_state: HealthState,
}

/// Health of one target as observed by its prober.
///
/// The alive flag is an atomic so the selection scan never waits on a prober
/// that is busy recording an outcome.
#[derive(Debug)]
pub struct Probe {
    health_check: HealthCheck,
    alive: AtomicBool,
    state: Mutex<ProbeState>,
}

impl Probe {
    pub fn new(health_check: HealthCheck) -> Self {
        Self {
            health_check,
            alive: AtomicBool::new(true),
            state: Mutex::new(ProbeState {
                consecutive_failures: 0,
                health_state: HealthState::Healthy,
            }),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn health_check(&self) -> &HealthCheck {
        &self.health_check
    }

    pub fn record_success(&self) -> Option<HealthTransition> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let ProbeState {
            consecutive_failures,
            health_state,
        } = &mut *state;

        match health_state {
            HealthState::Healthy => {
                *consecutive_failures = 0;
                None
            }
            HealthState::Unhealthy { until, successes } => {
                if Instant::now() < *until {
                    return None;
                }

                *successes += 1;
                if *successes >= self.health_check.success_threshold {
                    *consecutive_failures = 0;
                    *health_state = HealthState::Healthy;
                    self.alive.store(true, Ordering::Release);
                    return Some(HealthTransition::BecameHealthy);
                }
                None
            }
        }
    }

    pub fn record_failure(&self) -> Option<HealthTransition> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let HealthState::Unhealthy { successes, .. } = &mut state.health_state {
            *successes = 0;
            return None;
        }

        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        if state.consecutive_failures < self.health_check.failure_threshold {
            return None;
        }

        state.consecutive_failures = 0;
        let cooldown = Duration::from_millis(self.health_check.cooldown_ms);
        state.health_state = HealthState::Unhealthy {
            until: Instant::now() + cooldown,
            successes: 0,
        };
        self.alive.store(false, Ordering::Release);
        Some(HealthTransition::BecameUnhealthy)
    }
}
