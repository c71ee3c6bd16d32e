//! Reconnection policy as an explicit state machine, independent of any
//! transport so it can be tested on its own.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry; doubles on each failure.
    pub initial: Duration,
    /// Ceiling for the computed delay.
    pub max: Duration,
    /// Retries allowed before giving up for good.
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            max_attempts: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectState {
    Idle,
    Connecting,
    Connected,
    Backoff { attempt: u32, delay: Duration },
    GivenUp,
}

/// What the agent should do after a connection is lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectDecision {
    RetryAfter { attempt: u32, delay: Duration },
    GiveUp,
}

#[derive(Debug)]
pub struct ReconnectPolicy {
    config: BackoffConfig,
    state: ReconnectState,
    /// Consecutive failed attempts; only a successful connection clears it,
    /// so the streak survives the `Backoff -> Connecting` transition.
    failures: u32,
}

impl ReconnectPolicy {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            state: ReconnectState::Idle,
            failures: 0,
        }
    }

    pub fn state(&self) -> &ReconnectState {
        &self.state
    }

    pub fn connect_started(&mut self) {
        if self.state != ReconnectState::GivenUp {
            self.state = ReconnectState::Connecting;
        }
    }

    /// A connection was established; the failure streak resets.
    pub fn connected(&mut self) {
        self.failures = 0;
        self.state = ReconnectState::Connected;
    }

    /// The connection dropped or the attempt failed. Returns the next step;
    /// past the retry ceiling the policy stays in `GivenUp` permanently.
    pub fn connection_lost(&mut self) -> ReconnectDecision {
        if self.state == ReconnectState::GivenUp {
            return ReconnectDecision::GiveUp;
        }

        self.failures += 1;
        let attempt = self.failures;

        if attempt > self.config.max_attempts {
            self.state = ReconnectState::GivenUp;
            return ReconnectDecision::GiveUp;
        }

        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .config
            .initial
            .saturating_mul(1u32 << exponent)
            .min(self.config.max);

        self.state = ReconnectState::Backoff { attempt, delay };
        ReconnectDecision::RetryAfter { attempt, delay }
    }

    /// Explicit disconnect: back to `Idle`, no retries pending.
    pub fn reset(&mut self) {
        self.failures = 0;
        self.state = ReconnectState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(initial_ms: u64, max_ms: u64, max_attempts: u32) -> BackoffConfig {
        BackoffConfig {
            initial: Duration::from_millis(initial_ms),
            max: Duration::from_millis(max_ms),
            max_attempts,
        }
    }

    #[test]
    fn delays_double_up_to_the_ceiling() {
        let mut policy = ReconnectPolicy::new(config(100, 450, 10));
        policy.connect_started();

        let mut delays = Vec::new();
        for _ in 0..4 {
            match policy.connection_lost() {
                ReconnectDecision::RetryAfter { delay, .. } => delays.push(delay.as_millis()),
                ReconnectDecision::GiveUp => panic!("should still retry"),
            }
        }

        assert_eq!(delays, vec![100, 200, 400, 450]);
    }

    #[test]
    fn gives_up_after_the_retry_ceiling() {
        let mut policy = ReconnectPolicy::new(config(10, 1000, 2));
        policy.connect_started();

        assert!(matches!(
            policy.connection_lost(),
            ReconnectDecision::RetryAfter { attempt: 1, .. }
        ));
        assert!(matches!(
            policy.connection_lost(),
            ReconnectDecision::RetryAfter { attempt: 2, .. }
        ));
        assert_eq!(policy.connection_lost(), ReconnectDecision::GiveUp);
        assert_eq!(policy.state(), &ReconnectState::GivenUp);

        // still given up on later calls
        assert_eq!(policy.connection_lost(), ReconnectDecision::GiveUp);
    }

    #[test]
    fn failure_streak_survives_renewed_connect_attempts() {
        // the agent starts a fresh attempt before each retry; that must not
        // reset the escalation
        let mut policy = ReconnectPolicy::new(config(100, 10_000, 2));

        let mut decisions = Vec::new();
        for _ in 0..4 {
            policy.connect_started();
            decisions.push(policy.connection_lost());
        }

        assert_eq!(
            decisions,
            vec![
                ReconnectDecision::RetryAfter {
                    attempt: 1,
                    delay: Duration::from_millis(100),
                },
                ReconnectDecision::RetryAfter {
                    attempt: 2,
                    delay: Duration::from_millis(200),
                },
                ReconnectDecision::GiveUp,
                ReconnectDecision::GiveUp,
            ]
        );
        assert_eq!(policy.state(), &ReconnectState::GivenUp);
    }

    #[test]
    fn a_successful_connection_resets_the_streak() {
        let mut policy = ReconnectPolicy::new(config(100, 10_000, 5));
        policy.connect_started();

        policy.connection_lost();
        policy.connection_lost();
        policy.connected();
        assert_eq!(policy.state(), &ReconnectState::Connected);

        match policy.connection_lost() {
            ReconnectDecision::RetryAfter { attempt, delay } => {
                assert_eq!(attempt, 1);
                assert_eq!(delay, Duration::from_millis(100));
            }
            ReconnectDecision::GiveUp => panic!("should retry"),
        }
    }

    #[test]
    fn explicit_reset_returns_to_idle() {
        let mut policy = ReconnectPolicy::new(config(100, 1000, 3));
        policy.connect_started();
        policy.connection_lost();

        policy.reset();
        assert_eq!(policy.state(), &ReconnectState::Idle);
    }
}
