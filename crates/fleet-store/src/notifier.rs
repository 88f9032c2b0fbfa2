//! `ChangeNotifier` over `sqlx::postgres::PgListener`.
//!
//! Control flow follows the original `postgres.Notifier.Listen` almost
//! exactly: an outer reconnect loop around an inner listen-and-forward loop,
//! 1s initial backoff doubling up to a 30s cap, reset to the initial value
//! on every successful (re)connect. The ~100-event buffer is the same
//! bound the original gives its forwarding channel.

use async_stream::stream;
use fleet_core::traits::{ChangeNotifier, NotifierEvent, NotifierStream};
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use async_trait::async_trait;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const EVENT_BUFFER: usize = 100;

pub struct PostgresNotifier {
    pool: PgPool,
    channel: String,
}

impl PostgresNotifier {
    pub fn new(pool: PgPool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
        }
    }

    async fn listen_once(&self, tx: &mpsc::Sender<NotifierEvent>, cancel: &CancellationToken) -> Result<(), sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(&self.channel).await?;
        info!(channel = %self.channel, "listening for change notifications");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                notification = listener.recv() => {
                    let notification = notification?;
                    let event = NotifierEvent {
                        channel: notification.channel().to_string(),
                        payload: notification.payload().to_string(),
                    };
                    if tx.send(event).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[async_trait]
impl ChangeNotifier for PostgresNotifier {
    async fn subscribe(&self, cancel: CancellationToken) -> NotifierStream {
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let pool = self.pool.clone();
        let channel = self.channel.clone();
        let listen_cancel = cancel.clone();

        tokio::spawn(async move {
            let notifier = PostgresNotifier { pool, channel };
            let mut backoff = INITIAL_BACKOFF;

            loop {
                if listen_cancel.is_cancelled() {
                    return;
                }
                match notifier.listen_once(&tx, &listen_cancel).await {
                    Ok(()) => return,
                    Err(e) => {
                        error!(error = %e, "notifier listener error, reconnecting");
                        tokio::select! {
                            _ = listen_cancel.cancelled() => return,
                            _ = tokio::time::sleep(backoff) => {
                                backoff = (backoff * 2).min(MAX_BACKOFF);
                            }
                        }
                    }
                }
            }
        });

        Box::pin(stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
            warn!("change notification channel closed");
        })
    }
}
