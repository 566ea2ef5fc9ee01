use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exam_core::model::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Durable progress for one session.
///
/// `elapsed_millis` is accumulated active duration persisted explicitly, so a
/// backgrounded app does not inflate it the way a wall-clock difference
/// would. `timestamp_millis` is the wall clock at save time; monotonicity is
/// not required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub question_index: u32,
    pub timestamp_millis: i64,
    pub elapsed_millis: i64,
}

/// Repository contract for session progress and the incomplete-session set.
///
/// Membership in the incomplete set is the source of truth for "has an
/// attempt in progress". A member may lack a progress record when no answer
/// was ever saved; recovery then falls back to question index 0.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Persist or overwrite the progress record for a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn save_progress(
        &self,
        session_id: &SessionId,
        record: &ProgressRecord,
    ) -> Result<(), StorageError>;

    /// Last saved question index, or `None` if never saved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_progress(&self, session_id: &SessionId) -> Result<Option<u32>, StorageError>;

    /// Last saved elapsed duration in milliseconds, or `None` if never saved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_elapsed(&self, session_id: &SessionId) -> Result<Option<i64>, StorageError>;

    /// Add a session to the incomplete set. Re-marking refreshes its recency.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if membership cannot be stored.
    async fn mark_incomplete(
        &self,
        session_id: &SessionId,
        marked_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Remove a session from the incomplete set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn remove_incomplete(&self, session_id: &SessionId) -> Result<(), StorageError>;

    /// All incomplete sessions, most recently marked first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn incomplete_sessions(&self) -> Result<Vec<SessionId>, StorageError>;

    /// Remove the progress record and incomplete membership together.
    ///
    /// Used after successful completion or an explicit restart.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn clear_session(&self, session_id: &SessionId) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<HashMap<SessionId, ProgressRecord>>>,
    incomplete: Arc<Mutex<Vec<(SessionId, DateTime<Utc>)>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            incomplete: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn save_progress(
        &self,
        session_id: &SessionId,
        record: &ProgressRecord,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(session_id.clone(), record.clone());
        Ok(())
    }

    async fn get_progress(&self, session_id: &SessionId) -> Result<Option<u32>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(session_id).map(|record| record.question_index))
    }

    async fn get_elapsed(&self, session_id: &SessionId) -> Result<Option<i64>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(session_id).map(|record| record.elapsed_millis))
    }

    async fn mark_incomplete(
        &self,
        session_id: &SessionId,
        marked_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .incomplete
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.retain(|(id, _)| id != session_id);
        guard.push((session_id.clone(), marked_at));
        Ok(())
    }

    async fn remove_incomplete(&self, session_id: &SessionId) -> Result<(), StorageError> {
        let mut guard = self
            .incomplete
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.retain(|(id, _)| id != session_id);
        Ok(())
    }

    async fn incomplete_sessions(&self) -> Result<Vec<SessionId>, StorageError> {
        let guard = self
            .incomplete
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut entries: Vec<(SessionId, DateTime<Utc>)> = guard.clone();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(entries.into_iter().map(|(id, _)| id).collect())
    }

    async fn clear_session(&self, session_id: &SessionId) -> Result<(), StorageError> {
        {
            let mut records = self
                .records
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            records.remove(session_id);
        }
        let mut incomplete = self
            .incomplete
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        incomplete.retain(|(id, _)| id != session_id);
        Ok(())
    }
}

/// Aggregates the progress repository behind a trait object for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let progress: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
        Self { progress }
    }
}
