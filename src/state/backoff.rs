use crate::config::CrawlerConfig;
use std::time::Duration;

/// Throttle state of a single dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleState {
    /// No throttle signal seen yet for this dispatch
    FirstThrottle,
    /// At least one throttle signal already handled
    RepeatThrottle,
}

/// Cooldown settings shared by every dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Sleep after the first throttle signal
    pub long_cooldown: Duration,
    /// Sleep after each subsequent throttle signal
    pub short_cooldown: Duration,
    /// Retries allowed before giving up; `None` retries forever
    pub max_retries: Option<u32>,
}

impl From<&CrawlerConfig> for BackoffPolicy {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            long_cooldown: config.long_cooldown(),
            short_cooldown: config.short_cooldown(),
            max_retries: config.max_retries,
        }
    }
}

/// What the caller should do after a throttle signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    /// Sleep for the given cooldown, then retry the same term
    Retry(Duration),
    /// The retry ceiling was reached; abandon the term
    GiveUp,
}

/// Two-state escalation for throttle handling
///
/// One controller is created per dispatch, so every term starts in
/// `FirstThrottle`. The controller only decides durations; sleeping is the
/// caller's job, which keeps it testable without a clock.
#[derive(Debug, Clone)]
pub struct BackoffController {
    policy: BackoffPolicy,
    state: ThrottleState,
    retries: u32,
}

impl BackoffController {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            state: ThrottleState::FirstThrottle,
            retries: 0,
        }
    }

    pub fn state(&self) -> ThrottleState {
        self.state
    }

    /// Number of retries granted so far
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Registers a throttle signal (rate limit or transient error)
    ///
    /// | State | Decision | Next state |
    /// |-------|----------|------------|
    /// | FirstThrottle | sleep long cooldown | RepeatThrottle |
    /// | RepeatThrottle | sleep short cooldown | RepeatThrottle |
    /// | any, ceiling reached | give up | unchanged |
    pub fn on_throttle(&mut self) -> BackoffDecision {
        if let Some(max) = self.policy.max_retries {
            if self.retries >= max {
                return BackoffDecision::GiveUp;
            }
        }

        self.retries += 1;
        match self.state {
            ThrottleState::FirstThrottle => {
                self.state = ThrottleState::RepeatThrottle;
                BackoffDecision::Retry(self.policy.long_cooldown)
            }
            ThrottleState::RepeatThrottle => BackoffDecision::Retry(self.policy.short_cooldown),
        }
    }
}
