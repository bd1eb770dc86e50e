use crate::db::connection::DbPool;
use crate::db::models::AggregateState;
use crate::error::AppError;
use crate::sse::{BroadcastMessage, relay};
use sqlx::{Error, Row};

/// Applies one vote inside a transaction.
///
/// The aggregate row is locked with `FOR UPDATE`, so concurrent votes from
/// any instance sharing the database serialize on it. With `notify` set, the
/// new bar is queued on the relay channel in the same transaction.
pub async fn apply_vote(
    pool: &DbPool,
    identity: &str,
    value: f64,
    notify: bool,
) -> Result<AggregateState, AppError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query("SELECT mean, vote_count FROM confidence_aggregate WHERE id = 1 FOR UPDATE")
        .fetch_one(&mut *tx)
        .await?;
    let current = AggregateState {
        mean: row.get("mean"),
        count: row.get("vote_count"),
    };

    let previous = sqlx::query_scalar::<_, f64>("SELECT last_vote FROM voters WHERE identity = $1")
        .bind(identity)
        .fetch_optional(&mut *tx)
        .await?;

    let next = match current.fold(previous, value) {
        Ok(next) => next,
        Err(e) => {
            tx.rollback().await?;
            return Err(e);
        }
    };

    sqlx::query("UPDATE confidence_aggregate SET mean = $1, vote_count = $2 WHERE id = 1")
        .bind(next.mean)
        .bind(next.count)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO voters (identity, last_vote) VALUES ($1, $2)
        ON CONFLICT (identity)
        DO UPDATE SET last_vote = EXCLUDED.last_vote, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(identity)
    .bind(value)
    .execute(&mut *tx)
    .await?;

    if notify {
        relay::notify(&mut *tx, &BroadcastMessage::vote(&next)).await?;
    }

    tx.commit().await?;
    Ok(next)
}

pub async fn get_aggregate(pool: &DbPool) -> Result<AggregateState, Error> {
    let row = sqlx::query("SELECT mean, vote_count FROM confidence_aggregate WHERE id = 1")
        .fetch_one(pool)
        .await?;

    Ok(AggregateState {
        mean: row.get("mean"),
        count: row.get("vote_count"),
    })
}

pub async fn reset_votes(pool: &DbPool) -> Result<(), Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("TRUNCATE voters").execute(&mut *tx).await?;

    sqlx::query("UPDATE confidence_aggregate SET mean = 0, vote_count = 0 WHERE id = 1")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::sse::EventCategory;
    use sqlx::postgres::PgListener;
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tokio::time::timeout;

    // Both tests reset the single aggregate row.
    static AGGREGATE_ROW: Mutex<()> = Mutex::const_new(());

    // Needs a scratch database: DATABASE_URL=... cargo test -- --ignored
    async fn test_pool() -> DbPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        init_db(&url).await.expect("failed to connect to DATABASE_URL")
    }

    fn vote_count(message: &BroadcastMessage) -> i64 {
        let (_, tail) = message.payload.split_once("Total votes: ").unwrap();
        tail.trim_end_matches("</p>").parse().unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore]
    async fn test_concurrent_votes_commit_and_notify_in_order() {
        let _row = AGGREGATE_ROW.lock().await;
        let pool = test_pool().await;
        reset_votes(&pool).await.unwrap();

        let mut listener = PgListener::connect_with(&pool).await.unwrap();
        listener.listen(relay::RELAY_CHANNEL).await.unwrap();

        let voters = 32;
        let handles: Vec<_> = (0..voters)
            .map(|i| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    apply_vote(&pool, &format!("pg-voter-{i}"), (i * 3) as f64, true).await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let state = get_aggregate(&pool).await.unwrap();
        assert_eq!(state.count, voters);
        let expected = (0..voters).map(|i| (i * 3) as f64).sum::<f64>() / voters as f64;
        assert!((state.mean - expected).abs() < 1e-6);

        let mut last = 0;
        while last < voters {
            let notification = timeout(Duration::from_secs(5), listener.recv())
                .await
                .expect("relay went quiet")
                .unwrap();
            let message: BroadcastMessage = serde_json::from_str(notification.payload()).unwrap();
            if message.category != EventCategory::Vote {
                continue;
            }
            let count = vote_count(&message);
            assert_eq!(count, last + 1, "vote notifications out of commit order");
            last = count;
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_revote_replaces_stored_value() {
        let _row = AGGREGATE_ROW.lock().await;
        let pool = test_pool().await;
        reset_votes(&pool).await.unwrap();

        apply_vote(&pool, "pg-a", 80.0, false).await.unwrap();
        apply_vote(&pool, "pg-b", 40.0, false).await.unwrap();
        let state = apply_vote(&pool, "pg-a", 20.0, false).await.unwrap();

        assert_eq!(state.count, 2);
        assert!((state.mean - 30.0).abs() < 1e-9);
        assert_eq!(get_aggregate(&pool).await.unwrap(), state);
    }
}
