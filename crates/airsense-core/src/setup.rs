//! Bounded-retry sensor startup

use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::app_state::SetupError;
use crate::sensors::{Sensor, SensorError};

/// How often, and how far apart, a failing startup step is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u8,
    pub delay_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay_ms: 5000,
        }
    }
}

/// Call `begin()` until it succeeds or the policy's attempts run out.
///
/// At least one attempt is always made. The delay only separates attempts;
/// there is none after the last failure.
pub async fn begin_with_retry<const COUNT: usize, S, D>(
    sensor: &mut S,
    delay: &mut D,
    policy: RetryPolicy,
) -> Result<(), SetupError>
where
    S: Sensor<COUNT>,
    D: DelayNs,
{
    let kind = S::KIND;
    let attempts = policy.attempts.max(1);
    let mut last_error = SensorError::NotInitialized {
        sensor: kind.name(),
    };

    for attempt in 1..=attempts {
        info!("Attempting to find {} sensor...", kind);
        match sensor.begin().await {
            Ok(()) => {
                info!("Found {} sensor", kind);
                return Ok(());
            }
            Err(e) => {
                warn!(
                    "Could not find {} sensor ({}/{}): {}. Please check wiring.",
                    kind, attempt, attempts, e
                );
                last_error = e;
            }
        }

        if attempt < attempts {
            delay.delay_ms(policy.delay_ms).await;
        }
    }

    error!("Giving up on {} sensor after {} attempts", kind, attempts);
    Err(SetupError::SensorNotFound {
        sensor: kind,
        attempts,
        last_error,
    })
}
