//! Cadence, outcomes and failure backoff of agent executions.

use std::time::Duration;

/// Cadence of one agent: how long to wait after success, after failure, and
/// how long a single execution may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentInterval {
    /// Delay after a successful run.
    pub interval: Duration,
    /// Delay after a failed run.
    pub error_interval: Duration,
    /// Longest a single execution may take.
    pub timeout: Duration,
}

impl AgentInterval {
    pub fn new(interval: Duration, error_interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            error_interval,
            timeout,
        }
    }

    /// Delay before the next run given the outcome of this one, without
    /// failure-class backoff.
    pub fn next_delay(&self, outcome: ExecutionStatus) -> Duration {
        match outcome {
            ExecutionStatus::Success => self.interval,
            ExecutionStatus::Failure => self.error_interval,
        }
    }
}

/// Coarse classification of a failed execution, used to pick a backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Credentials or permissions rejected. Retrying soon will not help.
    PermanentForbidden,
    /// The provider asked us to slow down.
    Throttled,
    /// Network trouble, timeouts, server-side errors.
    Transient,
    /// Anything else.
    Unknown,
}

impl FailureClass {
    /// Classify a provider error message by the hints SDKs put in them.
    pub fn from_message(message: &str) -> Self {
        const THROTTLED: &[&str] = &[
            "throttl",
            "rate exceeded",
            "too many requests",
            "toomanyrequests",
            "requestlimitexceeded",
            "slowdown",
            "429",
        ];
        const FORBIDDEN: &[&str] = &[
            "accessdenied",
            "access denied",
            "forbidden",
            "unauthorized",
            "403",
        ];
        const TRANSIENT: &[&str] = &[
            "timed out",
            "timeout",
            "connection",
            "unavailable",
            "internal error",
        ];

        let message = message.to_lowercase();
        let mentions = |hints: &[&str]| hints.iter().any(|hint| message.contains(hint));
        if mentions(THROTTLED) {
            Self::Throttled
        } else if mentions(FORBIDDEN) {
            Self::PermanentForbidden
        } else if mentions(TRANSIENT) {
            Self::Transient
        } else {
            Self::Unknown
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermanentForbidden => "permanent_forbidden",
            Self::Throttled => "throttled",
            Self::Transient => "transient",
            Self::Unknown => "unknown",
        }
    }
}

/// Failure-class aware retry delays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FailureBackoff {
    /// Transient failures retried at once before falling back to the error interval.
    pub max_immediate_retries: u32,
    /// Delay after a forbidden failure.
    pub permanent_forbidden: Duration,
    /// First throttled retry delay.
    pub throttled_base: Duration,
    /// Growth factor between throttled retries.
    pub throttled_multiplier: f64,
    /// Upper bound on throttled delays.
    pub throttled_cap: Duration,
    /// Symmetric jitter applied to non-zero delays, in `[0.0, 1.0]`.
    pub jitter_ratio: f64,
}

impl FailureBackoff {
    /// Delay after the `streak`-th consecutive failure of class `class`, before jitter.
    ///
    /// `streak` counts the failure being handled, so it is at least 1.
    pub fn base_delay(&self, interval: &AgentInterval, class: FailureClass, streak: u32) -> Duration {
        match class {
            FailureClass::PermanentForbidden => self.permanent_forbidden,
            FailureClass::Throttled => {
                let exponent = i32::try_from(streak.saturating_sub(1)).unwrap_or(i32::MAX);
                let raw = self.throttled_base.as_secs_f64() * self.throttled_multiplier.powi(exponent);
                Duration::try_from_secs_f64(raw)
                    .unwrap_or(self.throttled_cap)
                    .min(self.throttled_cap)
            }
            FailureClass::Transient if streak <= self.max_immediate_retries => Duration::ZERO,
            FailureClass::Transient | FailureClass::Unknown => interval.error_interval,
        }
    }
}

/// Per-agent overrides of the configured cadence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CustomSchedule {
    pub interval: Option<Duration>,
    pub error_interval: Option<Duration>,
    pub timeout: Option<Duration>,
}

/// Outcome of one execution as far as scheduling is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Loaded and stored.
    Success,
    /// Anything else, including a discarded result.
    Failure,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Account/region an agent is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountScope {
    pub account: String,
    pub region: Option<String>,
}

impl AccountScope {
    /// Scope covering a whole account.
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}
