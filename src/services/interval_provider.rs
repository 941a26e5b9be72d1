//! Agent cadence and failure backoff.

use rand::Rng;
use std::time::Duration;

use crate::domain::models::{
    AgentInterval, AgentIntervalConfig, ExecutionStatus, FailureBackoff, FailureClass,
};
use crate::domain::ports::Agent;

/// Resolves the cadence of each agent: configured defaults, overridden by
/// the agent's own custom schedule, plus the delay before each next run.
#[derive(Debug, Clone, Copy)]
pub struct AgentIntervalProvider {
    defaults: AgentInterval,
    backoff: Option<FailureBackoff>,
}

impl AgentIntervalProvider {
    /// Provider using `defaults`, with the flat error interval on failure.
    pub fn new(defaults: AgentInterval) -> Self {
        Self {
            defaults,
            backoff: None,
        }
    }

    /// Provider built from the `agent` config section, with failure backoff when enabled.
    pub fn from_config(config: &AgentIntervalConfig) -> Self {
        Self::new(AgentInterval::new(
            Duration::from_millis(config.interval_ms),
            Duration::from_millis(config.error_interval_ms),
            Duration::from_millis(config.timeout_ms),
        ))
        .with_failure_backoff(config.failure_backoff.policy())
    }

    /// Back off failed runs by failure class instead of the flat error interval.
    pub fn with_failure_backoff(mut self, backoff: Option<FailureBackoff>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Cadence used when an agent has no custom schedule.
    pub fn defaults(&self) -> AgentInterval {
        self.defaults
    }

    /// Delay before the next run of an agent.
    ///
    /// `failure` is `None` after a successful run. `consecutive_failures`
    /// includes the run just finished.
    pub fn next_delay(
        &self,
        interval: &AgentInterval,
        failure: Option<FailureClass>,
        consecutive_failures: u32,
    ) -> Duration {
        let Some(class) = failure else {
            return interval.next_delay(ExecutionStatus::Success);
        };
        let Some(backoff) = &self.backoff else {
            return interval.next_delay(ExecutionStatus::Failure);
        };
        let base = backoff.base_delay(interval, class, consecutive_failures.max(1));
        jittered(base, backoff.jitter_ratio, &mut rand::thread_rng())
    }

    /// Cadence of `agent`. A custom interval without a custom error interval drives both.
    pub fn interval_for(&self, agent: &dyn Agent) -> AgentInterval {
        let Some(custom) = agent.custom_schedule() else {
            return self.defaults;
        };
        let interval = custom.interval.unwrap_or(self.defaults.interval);
        AgentInterval::new(
            interval,
            custom.error_interval.unwrap_or(if custom.interval.is_some() {
                interval
            } else {
                self.defaults.error_interval
            }),
            custom.timeout.unwrap_or(self.defaults.timeout),
        )
    }
}

/// Spread `base` by a random factor in `[1 - ratio, 1 + ratio]`. Non-zero
/// delays never drop below one millisecond.
pub fn jittered<R: Rng + ?Sized>(base: Duration, ratio: f64, rng: &mut R) -> Duration {
    if base.is_zero() || ratio <= 0.0 {
        return base;
    }
    let ratio = ratio.min(1.0);
    let factor = 1.0 + rng.gen_range(-ratio..=ratio);
    base.mul_f64(factor).max(Duration::from_millis(1))
}
