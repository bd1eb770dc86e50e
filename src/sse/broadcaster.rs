use crate::db::DbPool;
use crate::error::AppError;
use crate::sse::models::{BroadcastMessage, EventCategory};
use crate::sse::relay;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Fans every published message out to all live subscriptions.
///
/// Publishing never waits on a viewer: the channel is bounded and a viewer
/// that falls behind loses its oldest undelivered messages instead.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Inner>,
}

struct Inner {
    tx: broadcast::Sender<BroadcastMessage>,
    shutdown: watch::Sender<bool>,
    relay: Option<DbPool>,
}

impl Broadcaster {
    /// Delivers publications to this process only.
    pub fn new(capacity: usize) -> Self {
        Self::build(capacity, None)
    }

    /// Publishes through Postgres NOTIFY so every instance listening on the
    /// same database delivers the message. Pair with [`relay::spawn_listener`].
    pub fn with_relay(capacity: usize, pool: DbPool) -> Self {
        Self::build(capacity, Some(pool))
    }

    fn build(capacity: usize, relay: Option<DbPool>) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                tx,
                shutdown,
                relay,
            }),
        }
    }

    /// Starts a subscription. Only messages published from now on arrive.
    pub fn subscribe(&self) -> Subscription {
        let subscription = Subscription {
            id: Uuid::new_v4(),
            rx: Some(self.inner.tx.subscribe()),
            shutdown: self.inner.shutdown.subscribe(),
        };
        debug!(subscription = %subscription.id, "viewer subscribed");
        subscription
    }

    /// Failures are logged and dropped; they never reach the caller.
    pub async fn publish(&self, category: EventCategory, payload: impl Into<String>) {
        self.publish_message(BroadcastMessage::new(category, payload))
            .await;
    }

    pub async fn publish_message(&self, message: BroadcastMessage) {
        match &self.inner.relay {
            Some(pool) => {
                if let Err(e) = relay::notify(pool, &message).await {
                    error!(
                        category = message.category.as_str(),
                        "Failed to relay broadcast: {}", e
                    );
                }
            }
            None => {
                self.deliver(message);
            }
        }
    }

    /// True when publications travel through Postgres NOTIFY.
    pub fn is_relayed(&self) -> bool {
        self.inner.relay.is_some()
    }

    /// Hands a message to the local subscriptions and returns how many got it.
    pub(crate) fn deliver(&self, message: BroadcastMessage) -> usize {
        let category = message.category.as_str();

        match self.inner.tx.send(message) {
            Ok(receivers) => {
                debug!(category, receivers, "broadcast delivered");
                receivers
            }
            Err(_) => {
                debug!(category, "broadcast dropped, no live viewers");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }

    /// Ends every live subscription, current and future.
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    pub fn is_shut_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }
}

/// One viewer's handle on the broadcast. Dropping it unsubscribes.
pub struct Subscription {
    id: Uuid,
    rx: Option<broadcast::Receiver<BroadcastMessage>>,
    shutdown: watch::Receiver<bool>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Waits for the next message.
    ///
    /// Returns [`AppError::StreamClosed`] once the subscription is released,
    /// the broadcaster shuts down, or the channel goes away.
    pub async fn recv(&mut self) -> Result<BroadcastMessage, AppError> {
        loop {
            let Some(rx) = self.rx.as_mut() else {
                return Err(AppError::StreamClosed);
            };

            let received = tokio::select! {
                biased;
                _ = closed(&mut self.shutdown) => None,
                received = rx.recv() => Some(received),
            };

            match received {
                Some(Ok(message)) => return Ok(message),
                Some(Err(RecvError::Lagged(skipped))) => {
                    warn!(subscription = %self.id, skipped, "viewer lagging, dropped oldest messages");
                }
                Some(Err(RecvError::Closed)) | None => {
                    self.unsubscribe();
                    return Err(AppError::StreamClosed);
                }
            }
        }
    }

    /// Releases the subscription. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        if self.rx.take().is_some() {
            debug!(subscription = %self.id, "viewer unsubscribed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

async fn closed(shutdown: &mut watch::Receiver<bool>) {
    // An error means the broadcaster itself is gone, which ends the stream too.
    let _ = shutdown.wait_for(|closed| *closed).await;
}
