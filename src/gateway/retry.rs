use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::GatewayError;

/// Retry budget handed to every order or position call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay_ms: 100,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Run `op` until it succeeds, fails permanently, or the attempts run out
///
/// Transient failures are retried after the policy delay; exhaustion is
/// reported as [`GatewayError::Timeout`].
pub async fn retry_with_policy<T, F>(policy: &RetryPolicy, mut op: F) -> Result<T, GatewayError>
where
    F: FnMut() -> Result<T, GatewayError>,
{
    let attempts = policy.attempts.max(1);

    for attempt in 1..=attempts {
        match op() {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!("Gateway call succeeded after {} attempts", attempt);
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() => {
                tracing::debug!(attempt, max = attempts, "Gateway call failed: {}", e);
                if attempt < attempts {
                    tokio::time::sleep(policy.delay()).await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(GatewayError::Timeout { attempts })
}
