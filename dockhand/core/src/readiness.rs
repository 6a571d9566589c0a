use std::{fmt::Display, future::Future, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

/// A single failed readiness attempt, handed to observers for visibility.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedAttempt<'a> {
    pub resource: &'a str,
    pub attempt: u32,
    pub max_attempts: u32,
    pub error: String,
}

/// Result of polling a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub ready: bool,
    /// Number of times the check ran.
    pub attempts: u32,
}

/// Poll `check` until it succeeds or `max_attempts` checks have failed,
/// sleeping `delay` between failures. Returns true on the first success.
pub async fn probe<F, Fut, E>(resource: &str, max_attempts: u32, delay: Duration, check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    probe_with_observer(resource, max_attempts, delay, check, |_| {})
        .await
        .ready
}

/// Like [`probe`], reporting every failed attempt to `observer` and returning
/// the attempt count.
pub async fn probe_with_observer<F, Fut, E, O>(
    resource: &str,
    max_attempts: u32,
    delay: Duration,
    mut check: F,
    mut observer: O,
) -> ProbeOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
    O: FnMut(FailedAttempt<'_>),
{
    for attempt in 1..=max_attempts {
        match check().await {
            Ok(()) => {
                info!(resource, attempt, max_attempts, "resource ready");
                return ProbeOutcome {
                    ready: true,
                    attempts: attempt,
                };
            }
            Err(err) => {
                let error = err.to_string();
                warn!(
                    resource,
                    attempt,
                    max_attempts,
                    error = %error,
                    "resource not ready"
                );
                observer(FailedAttempt {
                    resource,
                    attempt,
                    max_attempts,
                    error,
                });
                if attempt < max_attempts {
                    sleep(delay).await;
                }
            }
        }
    }

    warn!(resource, max_attempts, "readiness attempts exhausted");
    ProbeOutcome {
        ready: false,
        attempts: max_attempts,
    }
}
