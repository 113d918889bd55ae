//! Network association
//!
//! The platform driver owns the actual association state; this module only
//! defines how the rest of the application observes and drives it:
//!
//! - [`Connectivity`] is implemented by the firmware WiFi link and by the
//!   simulator's host link.
//! - [`join`] performs the initial association under a bounded
//!   [`JoinPolicy`] and hands the outcome back to the caller.

use core::net::Ipv4Addr;

use embedded_hal_async::delay::DelayNs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

/// Observable association state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Associated,
    NotAssociated,
}

impl LinkStatus {
    pub const fn is_associated(self) -> bool {
        matches!(self, LinkStatus::Associated)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    #[error("association timed out")]
    Timeout,
    #[error("access point rejected the association")]
    Rejected,
    #[error("no address was assigned")]
    NoAddress,
    #[error("radio driver error")]
    Radio,
}

/// A network link that can be associated and observed.
pub trait Connectivity {
    /// Run one association attempt and wait until it either succeeds (with an
    /// address assigned) or fails.
    fn associate(&mut self) -> impl Future<Output = Result<(), LinkError>>;

    /// Ask the driver to associate without waiting for the outcome.
    fn begin_association(&mut self);

    fn status(&self) -> LinkStatus;

    /// Address assigned to this device, once associated.
    fn local_address(&self) -> Option<Ipv4Addr>;
}

const JOIN_MAX_ATTEMPTS_DEFAULT: u32 = 10;
// Same cadence the progress dots used to be printed at.
const JOIN_BACKOFF_DEFAULT_MS: u32 = 500;
const JOIN_BACKOFF_MAX_DEFAULT_MS: u32 = 30_000;
const JOIN_ATTEMPT_TIMEOUT_DEFAULT_MS: u32 = 20_000;

/// Retry policy for the initial association.
///
/// `max_attempts == 0` keeps retrying forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u32,
    pub backoff_max_ms: u32,
    pub attempt_timeout_ms: u32,
}

impl JoinPolicy {
    pub const fn defaults() -> Self {
        Self {
            max_attempts: JOIN_MAX_ATTEMPTS_DEFAULT,
            backoff_ms: JOIN_BACKOFF_DEFAULT_MS,
            backoff_max_ms: JOIN_BACKOFF_MAX_DEFAULT_MS,
            attempt_timeout_ms: JOIN_ATTEMPT_TIMEOUT_DEFAULT_MS,
        }
    }

    /// Keep trying until the network shows up.
    pub const fn unbounded() -> Self {
        Self {
            max_attempts: 0,
            ..Self::defaults()
        }
    }

    pub const fn sanitized(self) -> Self {
        let backoff_ms = clamp_u32(self.backoff_ms, 50, 60_000);
        let mut backoff_max_ms = clamp_u32(self.backoff_max_ms, 50, 600_000);
        if backoff_max_ms < backoff_ms {
            backoff_max_ms = backoff_ms;
        }
        let attempt_timeout_ms = clamp_u32(self.attempt_timeout_ms, 1_000, 180_000);
        Self {
            max_attempts: self.max_attempts,
            backoff_ms,
            backoff_max_ms,
            attempt_timeout_ms,
        }
    }

    pub const fn is_bounded(&self) -> bool {
        self.max_attempts != 0
    }

    /// Wait after the `failed`-th failed attempt (1-based): the base backoff
    /// doubled per previous failure, capped at `backoff_max_ms`.
    pub const fn backoff_after(&self, failed: u32) -> u32 {
        let doublings = if failed == 0 { 0 } else { failed - 1 };
        let factor = if doublings >= 31 {
            u32::MAX
        } else {
            1u32 << doublings
        };
        let wait = self.backoff_ms.saturating_mul(factor);
        if wait > self.backoff_max_ms {
            self.backoff_max_ms
        } else {
            wait
        }
    }
}

impl Default for JoinPolicy {
    fn default() -> Self {
        Self::defaults()
    }
}

const fn clamp_u32(value: u32, min: u32, max: u32) -> u32 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Successful initial association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Joined {
    pub attempts: u32,
    pub address: Option<Ipv4Addr>,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    #[error("gave up joining after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: LinkError },
}

/// Associate `link` under `policy`, sleeping on `delay` between attempts.
pub async fn join<C, D>(
    link: &mut C,
    policy: &JoinPolicy,
    delay: &mut D,
) -> Result<Joined, JoinError>
where
    C: Connectivity,
    D: DelayNs,
{
    let policy = policy.sanitized();
    let mut attempt: u32 = 0;

    loop {
        attempt = attempt.saturating_add(1);
        if policy.is_bounded() {
            info!("Connecting to WiFi (attempt {}/{})", attempt, policy.max_attempts);
        } else {
            info!("Connecting to WiFi (attempt {})", attempt);
        }

        match link.associate().await {
            Ok(()) => {
                let address = link.local_address();
                info!("WiFi connected!");
                match address {
                    Some(address) => info!("{}", address),
                    None => warn!("WiFi connected without an IPv4 address"),
                }
                return Ok(Joined { attempts: attempt, address });
            }
            Err(err) => {
                warn!("WiFi association attempt {} failed: {}", attempt, err);
                if policy.is_bounded() && attempt >= policy.max_attempts {
                    return Err(JoinError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                delay.delay_ms(policy.backoff_after(attempt)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingDelay, ScriptedLink};
    use embassy_futures::block_on;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = JoinPolicy {
            max_attempts: 0,
            backoff_ms: 500,
            backoff_max_ms: 3_000,
            attempt_timeout_ms: 10_000,
        };

        assert_eq!(policy.backoff_after(1), 500);
        assert_eq!(policy.backoff_after(2), 1_000);
        assert_eq!(policy.backoff_after(3), 2_000);
        assert_eq!(policy.backoff_after(4), 3_000);
        assert_eq!(policy.backoff_after(40), 3_000);
    }

    #[test]
    fn test_sanitized_keeps_cap_above_base() {
        let policy = JoinPolicy {
            max_attempts: 3,
            backoff_ms: 5_000,
            backoff_max_ms: 100,
            attempt_timeout_ms: 0,
        }
        .sanitized();

        assert_eq!(policy.backoff_max_ms, 5_000);
        assert_eq!(policy.attempt_timeout_ms, 1_000);
        assert_eq!(policy.max_attempts, 3);
    }

    #[test]
    fn test_join_succeeds_after_failures() {
        let mut link = ScriptedLink::joining_after(2);
        let mut delay = RecordingDelay::default();

        let joined = block_on(join(&mut link, &JoinPolicy::defaults(), &mut delay)).unwrap();

        assert_eq!(joined.attempts, 3);
        assert_eq!(joined.address, Some(Ipv4Addr::new(192, 168, 4, 2)));
        assert_eq!(link.associate_calls, 3);
        assert_eq!(delay.waits_ms, [500, 1_000]);
        assert!(link.status().is_associated());
    }

    #[test]
    fn test_join_gives_up_when_bounded() {
        let mut link = ScriptedLink::never_joining(LinkError::Rejected);
        let mut delay = RecordingDelay::default();
        let policy = JoinPolicy {
            max_attempts: 4,
            ..JoinPolicy::defaults()
        };

        let result = block_on(join(&mut link, &policy, &mut delay));

        assert_eq!(
            result,
            Err(JoinError::Exhausted {
                attempts: 4,
                last: LinkError::Rejected
            })
        );
        assert_eq!(link.associate_calls, 4);
        // No wait after the final attempt.
        assert_eq!(delay.waits_ms.len(), 3);
        assert_eq!(link.status(), LinkStatus::NotAssociated);
    }

    #[test]
    fn test_unbounded_join_keeps_going() {
        let mut link = ScriptedLink::joining_after(25);
        let mut delay = RecordingDelay::default();

        let joined = block_on(join(&mut link, &JoinPolicy::unbounded(), &mut delay)).unwrap();

        assert_eq!(joined.attempts, 26);
        assert_eq!(delay.waits_ms.len(), 25);
        assert!(delay.waits_ms.iter().all(|&ms| ms <= JOIN_BACKOFF_MAX_DEFAULT_MS));
    }

    #[test]
    fn test_join_error_message() {
        let err = JoinError::Exhausted {
            attempts: 10,
            last: LinkError::Timeout,
        };
        assert_eq!(
            alloc::format!("{}", err),
            "gave up joining after 10 attempts: association timed out"
        );
    }
}
