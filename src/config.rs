//! Runtime-configurable parameters for simcomm groups.
//!
//! All values have sensible defaults. Override via environment variables
//! (prefixed `SIMCOMM_`) or by constructing a custom `SimcommConfig`.

use std::time::Duration;

/// Deadlines a [`Group`](crate::Group) imposes on blocking rendezvous calls.
///
/// Communicators themselves never time out; an under-subscribed rendezvous
/// blocks until the owning group gives up on it.
#[derive(Debug, Clone)]
pub struct SimcommConfig {
    /// Timeout for allreduce and allgather.
    pub collective_timeout: Duration,

    /// Timeout for send and recv.
    pub p2p_timeout: Duration,
}

impl Default for SimcommConfig {
    fn default() -> Self {
        Self {
            collective_timeout: Duration::from_secs(30),
            p2p_timeout: Duration::from_secs(30),
        }
    }
}

impl SimcommConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `SIMCOMM_COLLECTIVE_TIMEOUT_MS`
    /// - `SIMCOMM_P2P_TIMEOUT_MS`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(d) = env_millis("SIMCOMM_COLLECTIVE_TIMEOUT_MS") {
            cfg.collective_timeout = d;
        }
        if let Some(d) = env_millis("SIMCOMM_P2P_TIMEOUT_MS") {
            cfg.p2p_timeout = d;
        }

        cfg
    }

    /// Use the same deadline for every blocking call.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            collective_timeout: timeout,
            p2p_timeout: timeout,
        }
    }
}

fn env_millis(var: &str) -> Option<Duration> {
    let raw = std::env::var(var).ok()?;
    match raw.parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(e) => {
            tracing::warn!(var, value = %raw, error = %e, "ignoring unparsable config value");
            None
        }
    }
}
