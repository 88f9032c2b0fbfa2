//! Server-streaming collection with heartbeat-based liveness detection.
//!
//! State machine: `Connecting -> Receiving <-> BackingOff -> Terminated`.
//! Entry is always `Connecting`; `Terminated` is reached only by
//! cancellation or by exhausting `max_retries` consecutive reconnects.
//! Control flow follows the original `StreamingStrategy.stream`, with the
//! heartbeat-timeout and reconnect semantics as the authoritative source
//! rather than that placeholder.

use std::future::Future;

use fleet_types::{Diagnostic, FleetError};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::retry::RetryConfig;
use crate::traits::DiagnosticStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Connecting,
    Receiving,
    BackingOff,
    Terminated,
}

/// Runs the streaming strategy until `cancel` fires or retries are
/// exhausted. `open` (re)establishes the stream; `on_item` is invoked for
/// each diagnostic received, resetting the heartbeat deadline only once
/// the item has been fully handed off — a burst of already-buffered items
/// is drained before the deadline is pushed out, so a slow consumer can't
/// mask a stalled producer.
pub async fn run<O, OFut, I, IFut, G, GFut>(
    device_id: &str,
    cancel: CancellationToken,
    retry: RetryConfig,
    open: O,
    on_item: I,
    on_giveup: G,
) where
    O: Fn() -> OFut,
    OFut: Future<Output = Result<DiagnosticStream, FleetError>>,
    I: Fn(Diagnostic) -> IFut,
    IFut: Future<Output = ()>,
    G: Fn() -> GFut,
    GFut: Future<Output = Result<(), FleetError>>,
{
    let mut state = State::Connecting;
    let mut attempt: u32 = 0;

    loop {
        state = match state {
            State::Connecting => {
                tokio::select! {
                    result = open() => match result {
                        Ok(stream) => {
                            attempt = 0;
                            match receive_until_stall(device_id, &cancel, &retry, stream, &on_item).await {
                                ReceiveOutcome::Cancelled => State::Terminated,
                                ReceiveOutcome::Stalled | ReceiveOutcome::Closed => State::BackingOff,
                            }
                        }
                        Err(e) => {
                            warn!(device_id, error = %e, "stream open failed");
                            State::BackingOff
                        }
                    },
                    _ = cancel.cancelled() => State::Terminated,
                }
            }
            State::Receiving => unreachable!("receive_until_stall owns the Receiving substate"),
            State::BackingOff => {
                attempt += 1;
                if attempt > retry.max_retries {
                    debug!(device_id, "streaming strategy exhausted reconnect attempts");
                    if let Err(e) = on_giveup().await {
                        error!(device_id, error = %e, "on_giveup handler failed");
                    }
                    State::Terminated
                } else {
                    match retry.cancellable_backoff(attempt, &cancel).await {
                        Ok(()) => State::Connecting,
                        Err(_) => State::Terminated,
                    }
                }
            }
            State::Terminated => {
                debug!(device_id, "streaming strategy terminated");
                return;
            }
        };
    }
}

enum ReceiveOutcome {
    Cancelled,
    Stalled,
    Closed,
}

async fn receive_until_stall<I, IFut>(
    device_id: &str,
    cancel: &CancellationToken,
    retry: &RetryConfig,
    mut stream: DiagnosticStream,
    on_item: &I,
) -> ReceiveOutcome
where
    I: Fn(Diagnostic) -> IFut,
    IFut: Future<Output = ()>,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return ReceiveOutcome::Cancelled,
            next = tokio::time::timeout(retry.heartbeat_timeout, stream.next()) => {
                match next {
                    Ok(Some(Ok(diagnostic))) => {
                        on_item(diagnostic).await;
                    }
                    Ok(Some(Err(e))) => {
                        warn!(device_id, error = %e, "stream item error");
                        return ReceiveOutcome::Closed;
                    }
                    Ok(None) => {
                        debug!(device_id, "stream closed by peer");
                        return ReceiveOutcome::Closed;
                    }
                    Err(_) => {
                        warn!(device_id, "heartbeat timeout, stream considered stalled");
                        return ReceiveOutcome::Stalled;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_stream::stream;

    fn retry() -> RetryConfig {
        RetryConfig {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(5),
            multiplier: 2.0,
            max_retries: 1,
            timeout: Duration::from_millis(50),
            heartbeat_timeout: Duration::from_millis(20),
        }
    }

    fn sample() -> Diagnostic {
        Diagnostic {
            device_id: "dev-1".into(),
            cpu_usage: 12.5,
            memory_usage: 40.0,
            device_status: fleet_types::DeviceStatus::Healthy,
            hardware_version: "rev-a".into(),
            software_version: "1.0.0".into(),
            firmware_version: "1.0.0".into(),
            checksum: "abc123".into(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn items_are_forwarded_to_on_item() {
        let received = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let open = || async {
            let s: DiagnosticStream = Box::pin(stream! {
                yield Ok(sample());
                yield Ok(sample());
            });
            Ok(s)
        };

        let r = received.clone();
        let on_item = move |_d: Diagnostic| {
            let r = r.clone();
            async move {
                r.fetch_add(1, Ordering::SeqCst);
            }
        };

        let cancel2 = cancel.clone();
        let on_giveup = move || {
            let cancel2 = cancel2.clone();
            async move {
                cancel2.cancel();
                Ok(())
            }
        };

        tokio::time::timeout(
            Duration::from_millis(500),
            run("dev-1", cancel, retry(), open, on_item, on_giveup),
        )
        .await
        .expect("strategy should terminate after giveup");

        assert_eq!(received.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn giveup_called_after_exhausting_reconnects() {
        let giveup_calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let open = || async { Err::<DiagnosticStream, FleetError>(FleetError::Transport("refused".into())) };
        let on_item = |_d: Diagnostic| async {};

        let gc = giveup_calls.clone();
        let cancel2 = cancel.clone();
        let on_giveup = move || {
            let gc = gc.clone();
            let cancel2 = cancel2.clone();
            async move {
                gc.fetch_add(1, Ordering::SeqCst);
                cancel2.cancel();
                Ok(())
            }
        };

        tokio::time::timeout(
            Duration::from_millis(500),
            run("dev-1", cancel, retry(), open, on_item, on_giveup),
        )
        .await
        .expect("strategy should terminate after giveup");

        assert_eq!(giveup_calls.load(Ordering::SeqCst), 1);
    }
}
