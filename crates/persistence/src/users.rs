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

//! User credential lookups (wallet address and exchange API keys), read by session creation to
//! resolve the exchange client and by the wallet verifier to resolve the expected address.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::error::PersistenceError;

/// The subset of a user's stored profile the engine needs to open an exchange session.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: String,
    pub wallet_address: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

/// Reads user credentials.
#[async_trait]
pub trait UserStore: std::fmt::Debug + Send + Sync {
    /// Fetches a user's credentials.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::UserNotFound`] if no row matches.
    async fn get_credentials(&self, user_id: &str) -> Result<UserCredentials, PersistenceError>;
}

/// A [`UserStore`] backed by the `users` Postgres table.
#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn get_credentials(&self, user_id: &str) -> Result<UserCredentials, PersistenceError> {
        let row = sqlx::query(
            "SELECT user_id, wallet_address, api_key, api_secret FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PersistenceError::UserNotFound(user_id.to_string()))?;

        Ok(UserCredentials {
            user_id: row.get("user_id"),
            wallet_address: row.get("wallet_address"),
            api_key: row.get("api_key"),
            api_secret: row.get("api_secret"),
        })
    }
}
