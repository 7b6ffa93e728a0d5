use std::time::Duration;

use crate::error::SyncError;
use crate::fetcher::Pacer;

/// Whole-run retry applied around the orchestrator from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    /// One retry, five minutes after the first failure.
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_secs(300),
        }
    }
}

#[derive(Debug)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn run<T, F, P>(&self, pacer: &P, mut operation: F) -> Result<Attempted<T>, SyncError>
    where
        F: FnMut(u32) -> Result<T, SyncError>,
        P: Pacer + ?Sized,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation(attempt) {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                    });
                }
                Err(err) if attempt < max_attempts && err.is_retryable() => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_secs = self.delay.as_secs(),
                        error = %err,
                        "run failed, retrying"
                    );
                    pacer.pause(self.delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
