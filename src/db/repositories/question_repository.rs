use crate::db::connection::DbPool;
use crate::db::models::QuestionEntry;
use sqlx::Error;
use sqlx::types::chrono::{DateTime, Utc};

pub async fn add_question(
    pool: &DbPool,
    text: &str,
    asked_at: DateTime<Utc>,
) -> Result<QuestionEntry, Error> {
    sqlx::query_as::<_, QuestionEntry>(
        "INSERT INTO questions (text, asked_at) VALUES ($1, $2) RETURNING text, asked_at",
    )
    .bind(text)
    .bind(asked_at)
    .fetch_one(pool)
    .await
}

pub async fn get_recent_questions(
    pool: &DbPool,
    offset: i64,
    limit: i64,
) -> Result<Vec<QuestionEntry>, Error> {
    sqlx::query_as::<_, QuestionEntry>(
        "SELECT text, asked_at FROM questions ORDER BY asked_at DESC, id DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn remove_question(pool: &DbPool, text: &str) -> Result<u64, Error> {
    let result = sqlx::query("DELETE FROM questions WHERE text = $1")
        .bind(text)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn clear_questions(pool: &DbPool) -> Result<(), Error> {
    sqlx::query("TRUNCATE questions").execute(pool).await?;

    Ok(())
}
