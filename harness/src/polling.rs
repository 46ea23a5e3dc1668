//! Bounded retry for conditions that become true in the background.
//!
//! Single-shot operations never retry themselves; every wait in the harness
//! is one of these functions wrapped around a single-shot check.

use log::debug;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};

/// A bounded wait exhausted its budget before the condition held.
#[derive(Debug, Clone, Error)]
#[error("{description} (waited {budget:?})")]
pub struct WaitTimeout {
    pub description: String,
    pub budget: Duration,
}

/// Repeatedly evaluates `condition` until it yields `Some(value)` or `timeout` elapses.
///
/// `Ok(None)` means "not yet". Errors from `condition` end the wait immediately;
/// a condition that wants to ride out a failure must map it to `Ok(None)` itself.
/// The condition is evaluated at least once, and once more at the deadline.
/// A `timeout` too large to represent as a deadline waits without bound.
pub async fn wait_for<T, E, F, Fut>(
    mut condition: F,
    timeout: Duration,
    poll_interval: Duration,
    message: Option<String>,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: From<WaitTimeout>,
{
    let deadline = Instant::now().checked_add(timeout);
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        if let Some(value) = condition().await? {
            debug!("Condition met after {} attempt(s)", attempts);
            return Ok(value);
        }

        match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                sleep(poll_interval.min(deadline - now)).await;
            }
            None => sleep(poll_interval).await,
        }
    }

    let description =
        message.unwrap_or_else(|| format!("condition not met within {:?}", timeout));
    Err(WaitTimeout {
        description,
        budget: timeout,
    }
    .into())
}

/// Waits until `producer` returns at least `expected` items, and returns them all.
pub async fn wait_for_messages<T, E, F, Fut>(
    mut producer: F,
    expected: usize,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Vec<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
    E: From<WaitTimeout>,
{
    wait_for(
        move || {
            let batch = producer();
            async move {
                let items = batch.await?;
                Ok::<_, E>((items.len() >= expected).then_some(items))
            }
        },
        timeout,
        poll_interval,
        Some(format!(
            "expected at least {} message(s) within {:?}",
            expected, timeout
        )),
    )
    .await
}

/// Waits until `producer` returns an item accepted by `filter`, and returns that item.
pub async fn wait_for_specific_message<T, E, F, Fut, P>(
    mut producer: F,
    filter: P,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
    P: Fn(&T) -> bool,
    E: From<WaitTimeout>,
{
    let filter = &filter;
    wait_for(
        move || {
            let batch = producer();
            async move {
                let items = batch.await?;
                Ok::<_, E>(items.into_iter().find(|item| filter(item)))
            }
        },
        timeout,
        poll_interval,
        Some(format!("expected message not found within {:?}", timeout)),
    )
    .await
}
