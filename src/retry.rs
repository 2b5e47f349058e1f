//! Bounded retry for connectivity set-up (Wi-Fi, broker).

use crate::error::{ConfigError, RetryError};

/// Attempt cap and fixed backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_ms: u32) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(Self {
            max_attempts,
            backoff_ms,
        })
    }

    /// Run `op` until it succeeds or the cap is hit.
    ///
    /// `op` receives the 1-based attempt number. `sleep` is called between
    /// attempts, never after the last one.
    pub fn run<T, E, F, S>(&self, mut op: F, mut sleep: S) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + 'static,
        F: FnMut(u32) -> Result<T, E>,
        S: FnMut(u32),
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts => {
                    return Err(RetryError {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    log::warn!("attempt {}/{} failed: {}", attempt, self.max_attempts, e);
                    sleep(self.backoff_ms);
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    /// 20 attempts, one second apart.
    fn default() -> Self {
        Self {
            max_attempts: 20,
            backoff_ms: 1_000,
        }
    }
}
