//! Client configuration: endpoints and timing knobs.
//!
//! All pacing intervals are configurable — the defaults reproduce the
//! reference behavior but none of the exact thresholds is load-bearing.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::PanelflowError;

/// Timing knobs for the presentation pipeline and polling.
#[derive(Debug, Clone, Copy)]
pub struct TimingConfig {
    /// One reveal unit per this interval.
    pub reveal_cadence: Duration,
    /// Gap between a segment's audio tail and the next segment.
    pub settle_delay: Duration,
    /// Pull cadence while the server computes responses live.
    pub poll_interval: Duration,
    /// Pull cadence when the server answers from cache; responses are
    /// pre-computed and arrive near-instantly, so the longer interval
    /// throttles request volume rather than pacing compute.
    pub poll_interval_cached: Duration,
    /// Wait before the one extra batch request after an intervention, so
    /// server-side processing settles before the stream is re-queried.
    pub intervention_followup_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            reveal_cadence: Duration::from_millis(120),
            settle_delay: Duration::from_millis(500),
            poll_interval: Duration::from_millis(1000),
            poll_interval_cached: Duration::from_millis(3000),
            intervention_followup_delay: Duration::from_millis(1000),
        }
    }
}

/// Full client configuration, loadable from a TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// HTTP base, e.g. `http://127.0.0.1:8000`.
    pub base_url: String,
    /// Websocket base, e.g. `ws://127.0.0.1:8000`.
    pub ws_base_url: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub reveal_cadence_ms: u64,
    pub settle_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub poll_interval_cached_ms: u64,
    pub intervention_followup_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let timing = TimingConfig::default();
        ClientConfig {
            base_url: "http://127.0.0.1:8000".to_string(),
            ws_base_url: "ws://127.0.0.1:8000".to_string(),
            connect_timeout_ms: 3_000,
            request_timeout_ms: 10_000,
            reveal_cadence_ms: timing.reveal_cadence.as_millis() as u64,
            settle_delay_ms: timing.settle_delay.as_millis() as u64,
            poll_interval_ms: timing.poll_interval.as_millis() as u64,
            poll_interval_cached_ms: timing.poll_interval_cached.as_millis() as u64,
            intervention_followup_delay_ms: timing.intervention_followup_delay.as_millis() as u64,
        }
    }
}

impl ClientConfig {
    /// Load from a TOML file, or defaults when no path is given. Unset keys
    /// fall back to their defaults; unknown keys are an error.
    pub fn load(path: Option<&Path>) -> Result<Self, PanelflowError> {
        let Some(path) = path else {
            return Ok(ClientConfig::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PanelflowError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        toml::from_str(&raw).map_err(|e| {
            PanelflowError::Config(format!("cannot parse {}: {e}", path.display()))
        })
    }

    pub fn timing(&self) -> TimingConfig {
        TimingConfig {
            reveal_cadence: Duration::from_millis(self.reveal_cadence_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            poll_interval_cached: Duration::from_millis(self.poll_interval_cached_ms),
            intervention_followup_delay: Duration::from_millis(
                self.intervention_followup_delay_ms,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_poll_intervals() {
        let timing = TimingConfig::default();
        assert_eq!(timing.poll_interval, Duration::from_millis(1000));
        assert_eq!(timing.poll_interval_cached, Duration::from_millis(3000));
    }

    #[test]
    fn test_load_none_gives_defaults() {
        let config = ClientConfig::load(None).unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:8000");
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: ClientConfig =
            toml::from_str("base_url = \"http://example:9000\"").unwrap();
        assert_eq!(config.base_url, "http://example:9000");
        assert_eq!(config.reveal_cadence_ms, 120);
    }
}
