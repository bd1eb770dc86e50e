use crate::db::DbPool;
use crate::error::AppError;
use crate::sse::broadcaster::Broadcaster;
use crate::sse::models::BroadcastMessage;
use sqlx::postgres::PgListener;
use sqlx::{Executor, Postgres};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub const RELAY_CHANNEL: &str = "confidence_bar_events";

/// Queues `message` on the relay channel.
///
/// Inside a transaction the notification goes out only when it commits, and
/// Postgres delivers notifications in commit order.
pub async fn notify<'e, E>(executor: E, message: &BroadcastMessage) -> Result<(), AppError>
where
    E: Executor<'e, Database = Postgres>,
{
    let payload = serde_json::to_string(message)?;

    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(RELAY_CHANNEL)
        .bind(payload)
        .execute(executor)
        .await?;

    Ok(())
}

/// Feeds every notification on the relay channel into the local broadcaster.
pub async fn spawn_listener(
    pool: &DbPool,
    broadcaster: Broadcaster,
) -> Result<JoinHandle<()>, sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(RELAY_CHANNEL).await?;
    info!("Listening for broadcasts on channel {}", RELAY_CHANNEL);

    Ok(tokio::spawn(async move {
        while !broadcaster.is_shut_down() {
            match listener.recv().await {
                Ok(notification) => {
                    match serde_json::from_str::<BroadcastMessage>(notification.payload()) {
                        Ok(message) => {
                            broadcaster.deliver(message);
                        }
                        Err(e) => warn!("Dropping malformed relay payload: {}", e),
                    }
                }
                Err(e) => {
                    // PgListener reconnects on the next recv.
                    error!("Relay listener error: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
        info!("Relay listener stopped");
    }))
}
