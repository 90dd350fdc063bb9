//! Reconnection backoff policy
//!
//! Connect-phase failures are retried with growing delays until `fail_after`
//! attempts have been burned, at which point the supervisor gives up and
//! parks in the failed state.

use rand::Rng;
use std::time::Duration;

/// Growth curve for successive reconnect delays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// initial, 2·initial, 4·initial, ...
    Exponential,
    /// initial·fib(n): initial, initial, 2·initial, 3·initial, 5·initial, ...
    Fibonacci,
}

/// Backoff configuration, part of the client options record
#[derive(Debug, Clone)]
pub struct BackoffOptions {
    pub strategy: BackoffStrategy,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Spread each delay uniformly inside `[d·(1-f), d·(1+f)]`
    pub randomisation_factor: f64,
    /// Give up after this many attempts; `None` retries indefinitely
    pub fail_after: Option<u32>,
}

impl Default for BackoffOptions {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Fibonacci,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            randomisation_factor: 0.0,
            fail_after: Some(10),
        }
    }
}

/// Tracks reconnect attempts and produces the next delay
#[derive(Debug)]
pub struct Backoff {
    options: BackoffOptions,
    attempts: u32,
}

impl Backoff {
    pub fn new(options: BackoffOptions) -> Self {
        Self {
            options,
            attempts: 0,
        }
    }

    /// Number of attempts consumed since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Forget past failures; called after a successful connect
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Consume one attempt and return the delay before the next connect,
    /// or `None` once `fail_after` is exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if let Some(cap) = self.options.fail_after {
            if self.attempts > cap {
                return None;
            }
        }

        let initial = self.options.initial_delay.as_millis() as u64;
        let max = self.options.max_delay.as_millis() as u64;

        let factor = match self.options.strategy {
            BackoffStrategy::Exponential => {
                let shift = (self.attempts - 1).min(20);
                1u64 << shift
            }
            BackoffStrategy::Fibonacci => fibonacci(self.attempts.min(30)),
        };

        let mut delay_ms = initial.saturating_mul(factor).min(max);

        let f = self.options.randomisation_factor;
        if f > 0.0 {
            let jitter = rand::thread_rng().gen_range((1.0 - f)..=(1.0 + f));
            delay_ms = ((delay_ms as f64 * jitter) as u64).min(max);
        }

        Some(Duration::from_millis(delay_ms))
    }
}

fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (1u64, 1u64);
    for _ in 1..n {
        let next = a + b;
        a = b;
        b = next;
    }
    a
}
