use std::time::Duration;

use super::interface::Transport;
use super::{Result, SerialError};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(20);

/// Bounded retry around the opcode handshake of a raw link.
///
/// Only handshake failures (timeout or a wrong acknowledgement byte) are
/// retried. Before every attempt after the first, pending inbound bytes are
/// discarded and the policy waits `delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), delay }
    }

    pub fn run<P, T, F>(&self, port: &mut P, mut attempt: F) -> Result<T>
    where
        P: Transport + ?Sized,
        F: FnMut(&mut P, u32) -> Result<T>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut n = 1;

        loop {
            match attempt(port, n) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && n < max_attempts => {}
                Err(e) if e.is_retryable() => {
                    return Err(SerialError::RetryExhausted {
                        attempts: max_attempts,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }

            n += 1;
            port.flush_input()?;
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}
