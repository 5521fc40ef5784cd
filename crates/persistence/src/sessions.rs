// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Grid Engine Contributors.
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! The session registry's persistent half (C9).
//!
//! Cross-process (user, instrument, Running) uniqueness is enforced by a Postgres partial
//! unique index (`idx_sessions_running_unique`, created in [`crate::pg`]), not by application
//! logic — the in-process admission control in `grid-live` only needs to avoid *contending* for
//! that index, not re-derive its guarantee.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};

use crate::error::PersistenceError;

/// A persisted session row.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    pub instrument: String,
    pub status: String,
    pub config: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persists and queries session records.
#[async_trait]
pub trait SessionStore: std::fmt::Debug + Send + Sync {
    /// Inserts a new `Creating` session row.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::DuplicateRunningSession`] if a `Running` session already
    /// exists for this (user, instrument) pair, or [`PersistenceError::Database`] on any other
    /// storage failure.
    async fn insert_creating(
        &self,
        session_id: &str,
        user_id: &str,
        instrument: &str,
        config: Value,
    ) -> Result<(), PersistenceError>;

    /// Updates the `status` column for `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::SessionNotFound`] if no row matches, or
    /// [`PersistenceError::DuplicateRunningSession`] if transitioning to `running` would
    /// violate the partial unique index.
    async fn set_status(&self, session_id: &str, status: &str) -> Result<(), PersistenceError>;

    /// Fetches a session by id.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::SessionNotFound`] if no row matches.
    async fn get(&self, session_id: &str) -> Result<SessionRecord, PersistenceError>;

    /// Lists every session belonging to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Database`] on storage failure.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<SessionRecord>, PersistenceError>;

    /// Deletes a session row outright (used by forced cleanup).
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Database`] on storage failure.
    async fn delete(&self, session_id: &str) -> Result<(), PersistenceError>;
}

/// A [`SessionStore`] backed by the `sessions` Postgres table.
#[derive(Debug, Clone)]
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn insert_creating(
        &self,
        session_id: &str,
        user_id: &str,
        instrument: &str,
        config: Value,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO sessions (session_id, user_id, instrument, status, config)
             VALUES ($1, $2, $3, 'creating', $4)",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(instrument)
        .bind(config)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PersistenceError::DuplicateRunningSession
            } else {
                PersistenceError::Database(e)
            }
        })?;
        Ok(())
    }

    async fn set_status(&self, session_id: &str, status: &str) -> Result<(), PersistenceError> {
        let result = sqlx::query(
            "UPDATE sessions SET status = $1, updated_at = now() WHERE session_id = $2",
        )
        .bind(status)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PersistenceError::DuplicateRunningSession
            } else {
                PersistenceError::Database(e)
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::SessionNotFound(session_id.to_string()));
        }
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<SessionRecord, PersistenceError> {
        let row = sqlx::query(
            "SELECT session_id, user_id, instrument, status, config, created_at, updated_at
             FROM sessions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PersistenceError::SessionNotFound(session_id.to_string()))?;

        Ok(row_to_record(&row))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<SessionRecord>, PersistenceError> {
        let rows = sqlx::query(
            "SELECT session_id, user_id, instrument, status, config, created_at, updated_at
             FROM sessions WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn delete(&self, session_id: &str) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> SessionRecord {
    SessionRecord {
        session_id: row.get("session_id"),
        user_id: row.get("user_id"),
        instrument: row.get("instrument"),
        status: row.get("status"),
        config: row.get("config"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
