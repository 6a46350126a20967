//! Timeout-bounded polling on top of the non-waiting [`Browser`] lookups.
//!
//! Waits fail deterministically once the timeout elapses and are never
//! retried here; callers decide whether a miss ends the run or the data.
use crate::browser::{Browser, Scope};
use harvest_common::{HarvestError, Locator, Result};
use std::time::Duration;
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll: Duration,
}

impl WaitPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll: Duration::from_millis(250),
        }
    }

    /// Single attempt, no sleeping.
    pub fn immediate() -> Self {
        Self {
            timeout: Duration::ZERO,
            poll: Duration::ZERO,
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

/// Poll until an element matching `locator` exists below `scope`.
///
/// Only `NotFound` is polled on; any other error is returned at once.
pub async fn wait_for<B>(
    browser: &B,
    scope: Scope<'_, B::Handle>,
    locator: &Locator,
    policy: WaitPolicy,
) -> Result<B::Handle>
where
    B: Browser + ?Sized,
{
    let deadline = Instant::now() + policy.timeout;
    loop {
        match browser.find(scope, locator).await {
            Ok(handle) => return Ok(handle),
            Err(HarvestError::NotFound(_)) if Instant::now() < deadline => {
                sleep(policy.poll).await;
            }
            Err(HarvestError::NotFound(_)) => {
                tracing::debug!(
                    target: "browser.wait",
                    %locator,
                    timeout_ms = policy.timeout.as_millis() as u64,
                    "element did not appear before timeout"
                );
                return Err(HarvestError::NotFound(format!(
                    "{locator} (after {} ms)",
                    policy.timeout.as_millis()
                )));
            }
            Err(other) => return Err(other),
        }
    }
}

/// Poll until `handle` reports visible; `Ok(false)` when the timeout elapses.
pub async fn wait_until_visible<B>(browser: &B, handle: &B::Handle, policy: WaitPolicy) -> Result<bool>
where
    B: Browser + ?Sized,
{
    let deadline = Instant::now() + policy.timeout;
    loop {
        if browser.visible(handle).await? {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        sleep(policy.poll).await;
    }
}
