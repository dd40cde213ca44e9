use chrono::Utc;
use sqlx::PgPool;
use tracing::error;

use crate::errors::AppError;
use crate::models::Thread;

#[derive(Clone)]
pub struct ThreadRepository {
    pool: PgPool,
}

impl ThreadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Thread>, AppError> {
        sqlx::query_as::<_, Thread>(
            "SELECT id, conversation_id, created_at, updated_at FROM threads WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to find thread {id}: {e}");
            AppError::db_query(format!("Failed to find thread {id}"), e)
        })
    }

    pub async fn save(&self, thread: &Thread) -> Result<Thread, AppError> {
        sqlx::query(
            "INSERT INTO threads (id, conversation_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&thread.id)
        .bind(&thread.conversation_id)
        .bind(thread.created_at)
        .bind(thread.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to save thread {}: {e}", thread.id);
            AppError::db_query("Failed to save thread", e)
        })?;
        Ok(thread.clone())
    }

    pub async fn update_timestamp(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE threads SET updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to update thread timestamp {id}: {e}");
                AppError::db_query("Failed to update thread", e)
            })?;
        Ok(())
    }
}
