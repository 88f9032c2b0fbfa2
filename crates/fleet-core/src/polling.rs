//! Fixed-interval collection with bounded retry.
//!
//! Control flow follows the original `PollingStrategy.poll` almost
//! verbatim: attempt 0 immediate, then up to `max_retries` backed-off
//! retries, then `on_giveup`.

use std::future::Future;
use std::time::Duration;

use fleet_types::FleetError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::retry::RetryConfig;

/// Runs `poll` every `interval` until `cancel` fires.
///
/// `poll` is assumed idempotent — it may be retried. `on_giveup` is called
/// once per tick that exhausts all retries; an error from it is logged,
/// never fatal. At most one `poll` is ever in flight, since the loop
/// awaits each attempt before scheduling the next tick.
pub async fn run<P, PFut, G, GFut>(
    device_id: &str,
    cancel: CancellationToken,
    interval: Duration,
    retry: RetryConfig,
    poll: P,
    on_giveup: G,
) where
    P: Fn() -> PFut,
    PFut: Future<Output = Result<(), FleetError>>,
    G: Fn() -> GFut,
    GFut: Future<Output = Result<(), FleetError>>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_one_cycle(device_id, &cancel, &retry, &poll, &on_giveup).await;
            }
            _ = cancel.cancelled() => {
                debug!(device_id, "polling strategy cancelled");
                return;
            }
        }
    }
}

async fn run_one_cycle<P, PFut, G, GFut>(
    device_id: &str,
    cancel: &CancellationToken,
    retry: &RetryConfig,
    poll: &P,
    on_giveup: &G,
) where
    P: Fn() -> PFut,
    PFut: Future<Output = Result<(), FleetError>>,
    G: Fn() -> GFut,
    GFut: Future<Output = Result<(), FleetError>>,
{
    for attempt in 0..=retry.max_retries {
        if attempt > 0 {
            match retry.cancellable_backoff(attempt, cancel).await {
                Ok(()) => {}
                Err(FleetError::Cancelled) => return,
                Err(_) => unreachable!("cancellable_backoff only returns Cancelled on error"),
            }
        }

        let attempt_result = tokio::select! {
            result = tokio::time::timeout(retry.timeout, poll()) => result,
            _ = cancel.cancelled() => return,
        };

        match attempt_result {
            Ok(Ok(())) => return,
            Ok(Err(e)) => {
                warn!(device_id, attempt, error = %e, "poll attempt failed");
            }
            Err(_) => {
                warn!(device_id, attempt, "poll attempt timed out");
            }
        }
    }

    debug!(device_id, "polling strategy exhausted retries, giving up for this cycle");
    if let Err(e) = on_giveup().await {
        error!(device_id, error = %e, "on_giveup handler failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn giveup_called_once_after_exhausting_retries() {
        let poll_calls = Arc::new(AtomicU32::new(0));
        let giveup_calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let retry = RetryConfig {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(5),
            multiplier: 2.0,
            max_retries: 2,
            timeout: Duration::from_millis(50),
            heartbeat_timeout: Duration::from_secs(1),
        };

        let pc = poll_calls.clone();
        let poll = move || {
            let pc = pc.clone();
            async move {
                pc.fetch_add(1, Ordering::SeqCst);
                Err::<(), FleetError>(FleetError::Transport("down".into()))
            }
        };

        let gc = giveup_calls.clone();
        let on_giveup = move || {
            let gc = gc.clone();
            async move {
                gc.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        };

        run_one_cycle("dev-1", &cancel, &retry, &poll, &on_giveup).await;

        assert_eq!(poll_calls.load(Ordering::SeqCst), 3); // attempt 0 + 2 retries
        assert_eq!(giveup_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn giveup_not_called_on_success() {
        let giveup_calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let retry = RetryConfig::default();

        let poll = || async { Ok(()) };

        let gc = giveup_calls.clone();
        let on_giveup = move || {
            let gc = gc.clone();
            async move {
                gc.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        };

        run_one_cycle("dev-1", &cancel, &retry, &poll, &on_giveup).await;

        assert_eq!(giveup_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancellation_short_circuits_cycle() {
        let poll_calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let retry = RetryConfig::default();

        let pc = poll_calls.clone();
        let poll = move || {
            let pc = pc.clone();
            async move {
                pc.fetch_add(1, Ordering::SeqCst);
                Err::<(), FleetError>(FleetError::Transport("down".into()))
            }
        };
        let on_giveup = || async { Ok(()) };

        run_one_cycle("dev-1", &cancel, &retry, &poll, &on_giveup).await;
        assert_eq!(poll_calls.load(Ordering::SeqCst), 0);
    }
}
