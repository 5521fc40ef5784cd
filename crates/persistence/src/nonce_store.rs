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

//! Nonce replay-defense storage (C3): a Postgres-backed primary store and a `DashMap`-backed
//! in-memory fallback used when the database is unreachable (the engine degrades to rejecting
//! replays within a single process rather than failing closed).

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use grid_cryptography::NonceStore;
use sqlx::PgPool;
use tracing::{error, warn};

/// Records nonces in the `used_nonces` Postgres table, relying on the primary key to make
/// `record_if_absent` atomic under concurrent callers.
#[derive(Debug, Clone)]
pub struct PostgresNonceStore {
    pool: PgPool,
}

impl PostgresNonceStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl NonceStore for PostgresNonceStore {
    async fn record_if_absent(
        &self,
        nonce: &str,
        timestamp_unix: i64,
        expires_at_unix: i64,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "INSERT INTO used_nonces (nonce, timestamp, expires_at) VALUES ($1, $2, $3)
             ON CONFLICT (nonce) DO NOTHING",
        )
        .bind(nonce)
        .bind(timestamp_unix)
        .bind(expires_at_unix)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn sweep_expired(&self, now_unix: i64) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM used_nonces WHERE expires_at < $1")
            .bind(now_unix)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// An in-memory nonce store. Used as a degradation path when Postgres is unreachable, and in
/// tests.
#[derive(Debug, Default)]
pub struct InMemoryNonceStore {
    records: DashMap<String, i64>,
}

impl InMemoryNonceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl NonceStore for InMemoryNonceStore {
    async fn record_if_absent(
        &self,
        nonce: &str,
        _timestamp_unix: i64,
        expires_at_unix: i64,
    ) -> anyhow::Result<bool> {
        use dashmap::mapref::entry::Entry;

        match self.records.entry(nonce.to_string()) {
            Entry::Occupied(_) => {
                warn!(nonce_prefix = &nonce[..nonce.len().min(10)], "nonce already recorded in memory");
                Ok(false)
            }
            Entry::Vacant(slot) => {
                slot.insert(expires_at_unix);
                Ok(true)
            }
        }
    }

    async fn sweep_expired(&self, now_unix: i64) -> anyhow::Result<u64> {
        let before = self.records.len();
        self.records.retain(|_, expires_at| *expires_at >= now_unix);
        Ok((before - self.records.len()) as u64)
    }
}

/// Wraps [`PostgresNonceStore`] as the primary store and [`InMemoryNonceStore`] as a fallback,
/// switching to the fallback the first time a primary call errors and staying there for the
/// rest of the process's life (spec.md §4.3 "Degradation"). The switch is logged once at `error`
/// level with the `event = "security.persistence_degraded"` field so it surfaces the same way a
/// replay attempt does, since an engine running on the in-memory fallback only rejects replays
/// within this one process rather than across the whole deployment.
#[derive(Debug)]
pub struct FallbackNonceStore {
    primary: PostgresNonceStore,
    fallback: InMemoryNonceStore,
    degraded: AtomicBool,
}

impl FallbackNonceStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            primary: PostgresNonceStore::new(pool),
            fallback: InMemoryNonceStore::new(),
            degraded: AtomicBool::new(false),
        }
    }

    fn degrade(&self, error: &anyhow::Error) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            error!(
                event = "security.persistence_degraded",
                %error,
                "nonce store lost its Postgres connection; degrading to an in-process store for the remainder of this process"
            );
        }
    }
}

#[async_trait::async_trait]
impl NonceStore for FallbackNonceStore {
    async fn record_if_absent(
        &self,
        nonce: &str,
        timestamp_unix: i64,
        expires_at_unix: i64,
    ) -> anyhow::Result<bool> {
        if self.degraded.load(Ordering::SeqCst) {
            return self.fallback.record_if_absent(nonce, timestamp_unix, expires_at_unix).await;
        }
        match self.primary.record_if_absent(nonce, timestamp_unix, expires_at_unix).await {
            Ok(result) => Ok(result),
            Err(error) => {
                self.degrade(&error);
                self.fallback.record_if_absent(nonce, timestamp_unix, expires_at_unix).await
            }
        }
    }

    async fn sweep_expired(&self, now_unix: i64) -> anyhow::Result<u64> {
        if self.degraded.load(Ordering::SeqCst) {
            return self.fallback.sweep_expired(now_unix).await;
        }
        match self.primary.sweep_expired(now_unix).await {
            Ok(result) => Ok(result),
            Err(error) => {
                self.degrade(&error);
                self.fallback.sweep_expired(now_unix).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_record_of_same_nonce_is_rejected() {
        let store = InMemoryNonceStore::new();
        assert!(store.record_if_absent("n1", 100, 400).await.unwrap());
        assert!(!store.record_if_absent("n1", 100, 400).await.unwrap());
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_records() {
        let store = InMemoryNonceStore::new();
        store.record_if_absent("fresh", 100, 1_000).await.unwrap();
        store.record_if_absent("stale", 100, 200).await.unwrap();

        let removed = store.sweep_expired(500).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!store.record_if_absent("fresh", 600, 2_000).await.unwrap());
    }
}
