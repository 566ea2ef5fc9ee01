use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use exam_core::model::SessionId;

use crate::repository::{ProgressRecord, ProgressRepository, StorageError};

use super::SqliteRepository;

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn save_progress(
        &self,
        session_id: &SessionId,
        record: &ProgressRecord,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO session_progress (
                session_id,
                question_index,
                timestamp_millis,
                elapsed_millis
            )
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(session_id) DO UPDATE SET
                question_index = excluded.question_index,
                timestamp_millis = excluded.timestamp_millis,
                elapsed_millis = excluded.elapsed_millis
            ",
        )
        .bind(session_id.as_str())
        .bind(i64::from(record.question_index))
        .bind(record.timestamp_millis)
        .bind(record.elapsed_millis)
        .execute(self.pool())
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn get_progress(&self, session_id: &SessionId) -> Result<Option<u32>, StorageError> {
        let row = sqlx::query("SELECT question_index FROM session_progress WHERE session_id = ?1")
            .bind(session_id.as_str())
            .fetch_optional(self.pool())
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let index: i64 = row
            .try_get("question_index")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let index =
            u32::try_from(index).map_err(|err| StorageError::Serialization(err.to_string()))?;
        Ok(Some(index))
    }

    async fn get_elapsed(&self, session_id: &SessionId) -> Result<Option<i64>, StorageError> {
        let row = sqlx::query("SELECT elapsed_millis FROM session_progress WHERE session_id = ?1")
            .bind(session_id.as_str())
            .fetch_optional(self.pool())
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let elapsed: i64 = row
            .try_get("elapsed_millis")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        Ok(Some(elapsed))
    }

    async fn mark_incomplete(
        &self,
        session_id: &SessionId,
        marked_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO incomplete_sessions (session_id, marked_at)
            VALUES (?1, ?2)
            ON CONFLICT(session_id) DO UPDATE SET
                marked_at = excluded.marked_at
            ",
        )
        .bind(session_id.as_str())
        .bind(marked_at.to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn remove_incomplete(&self, session_id: &SessionId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM incomplete_sessions WHERE session_id = ?1")
            .bind(session_id.as_str())
            .execute(self.pool())
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn incomplete_sessions(&self) -> Result<Vec<SessionId>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT session_id FROM incomplete_sessions
            ORDER BY marked_at DESC, session_id ASC
            ",
        )
        .fetch_all(self.pool())
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row
                .try_get("session_id")
                .map_err(|err| StorageError::Serialization(err.to_string()))?;
            sessions.push(SessionId::new(id));
        }
        Ok(sessions)
    }

    async fn clear_session(&self, session_id: &SessionId) -> Result<(), StorageError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        sqlx::query("DELETE FROM session_progress WHERE session_id = ?1")
            .bind(session_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        sqlx::query("DELETE FROM incomplete_sessions WHERE session_id = ?1")
            .bind(session_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        tx.commit()
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }
}
