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

//! The session manager (C9): admission control, (user, instrument) uniqueness, batch creation,
//! and force cleanup (spec.md §4.9).
//!
//! Grounded on the original bot's `SessionCreationLimiter`/`SessionManager` (a concurrent-set +
//! rolling-second admission gate, a `creating` set guarded by a short critical section, a
//! semaphore bounding batch creation).

use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};

use dashmap::DashMap;
use grid_core::{Clock, InstrumentId, SessionId};
use grid_network::{ExchangeClient, FillNotification, WsConnection};
use grid_persistence::SessionStore;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::{info, warn};

use crate::{
    error::LiveError,
    session::{Session, SessionConfig, SessionStatus},
};

/// Admission knobs bounding concurrent and per-second session creation (spec.md §4.9
/// "Admission").
#[derive(Debug, Clone, Copy)]
pub struct AdmissionConfig {
    pub max_concurrent_creating: usize,
    pub max_creations_per_second: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self { max_concurrent_creating: 5, max_creations_per_second: 10 }
    }
}

/// The rolling-second + concurrent-set admission gate, mirroring the original bot's
/// `SessionCreationLimiter`.
#[derive(Debug)]
struct AdmissionGate {
    config: AdmissionConfig,
    creating: Mutex<HashSet<SessionId>>,
    creation_times_ms: Mutex<VecDeque<i64>>,
    clock: Arc<dyn Clock>,
}

impl AdmissionGate {
    fn new(config: AdmissionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            creating: Mutex::new(HashSet::new()),
            creation_times_ms: Mutex::new(VecDeque::new()),
            clock,
        }
    }

    /// Reserves an admission slot for `session_id`, failing if either the concurrency cap or the
    /// rolling-second rate cap is exceeded.
    async fn acquire(&self, session_id: &SessionId) -> Result<(), LiveError> {
        let mut creating = self.creating.lock().await;
        if creating.len() >= self.config.max_concurrent_creating {
            return Err(LiveError::SessionCreateRateLimited);
        }

        let mut times = self.creation_times_ms.lock().await;
        let now = self.clock.timestamp_ms();
        while matches!(times.front(), Some(&t) if now - t >= 1000) {
            times.pop_front();
        }
        if times.len() >= self.config.max_creations_per_second {
            return Err(LiveError::SessionCreateRateLimited);
        }

        times.push_back(now);
        creating.insert(session_id.clone());
        Ok(())
    }

    async fn release(&self, session_id: &SessionId) {
        self.creating.lock().await.remove(session_id);
    }
}

/// Constructs the exchange client and WebSocket connection for a new session, along with the
/// receiving half of the channel the WebSocket's `FillHandler` forwards decoded fills into;
/// injected so the manager stays agnostic to concrete network wiring (the caller, e.g.
/// `grid-system`, owns credential lookup, connection setup, and wiring the `FillHandler` closure
/// to the sender half of that same channel per spec.md §4.2/§4.5).
pub type SessionFactory = Arc<
    dyn Fn(
            &SessionConfig,
        ) -> (Arc<dyn ExchangeClient>, Arc<WsConnection>, mpsc::UnboundedReceiver<FillNotification>)
        + Send
        + Sync,
>;

/// Maximum concurrent creations inside `create_batch` (spec.md §4.9 "Batch creation").
pub const BATCH_CREATION_CONCURRENCY: usize = 3;

/// `force_cleanup`'s bound on how long it waits for a graceful `stop()` (spec.md §4.9
/// "Force cleanup").
pub const FORCE_CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);

/// The C9 session manager: owns the in-memory session index and coordinates with the persistent
/// `sessions` store for cross-process uniqueness (spec.md §4.9 "Uniqueness").
pub struct SessionManager {
    sessions: Arc<DashMap<SessionId, Arc<Session>>>,
    admission: Arc<AdmissionGate>,
    store: Arc<dyn SessionStore>,
    factory: SessionFactory,
    batch_semaphore: Arc<Semaphore>,
    force_cleanup_timeout: Duration,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").field("active_sessions", &self.sessions.len()).finish()
    }
}

impl SessionManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        factory: SessionFactory,
        admission: AdmissionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            admission: Arc::new(AdmissionGate::new(admission, clock)),
            store,
            factory,
            batch_semaphore: Arc::new(Semaphore::new(BATCH_CREATION_CONCURRENCY)),
            force_cleanup_timeout: FORCE_CLEANUP_TIMEOUT,
        }
    }

    /// Creates and starts a single session, enforcing admission control and (user, instrument)
    /// uniqueness both in-memory and via the persistent store (spec.md §4.9).
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::SessionCreateRateLimited`] if admission is exhausted, or
    /// [`LiveError::DuplicateGridSession`] if a Running session already exists.
    pub async fn create_session(&self, config: SessionConfig) -> Result<Arc<Session>, LiveError> {
        let session_id = SessionId::new(&config.user_id, &config.instrument);

        if self.sessions.contains_key(&session_id) {
            return Err(LiveError::DuplicateGridSession);
        }

        self.admission.acquire(&session_id).await?;
        let result = create_one(
            &self.store,
            &self.factory,
            &self.sessions,
            session_id.clone(),
            config,
        )
        .await;
        self.admission.release(&session_id).await;
        result
    }

    /// Runs up to [`BATCH_CREATION_CONCURRENCY`] creations concurrently, returning a per-entry
    /// result in the input order (spec.md §4.9 "Batch creation").
    pub async fn create_batch(
        &self,
        configs: Vec<SessionConfig>,
    ) -> Vec<Result<Arc<Session>, LiveError>> {
        let mut set = tokio::task::JoinSet::new();
        let total = configs.len();
        for (index, config) in configs.into_iter().enumerate() {
            let semaphore = Arc::clone(&self.batch_semaphore);
            let admission = Arc::clone(&self.admission);
            let session_id = SessionId::new(&config.user_id, &config.instrument);
            let store = Arc::clone(&self.store);
            let factory = Arc::clone(&self.factory);
            let sessions = Arc::clone(&self.sessions);

            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                if let Err(error) = admission.acquire(&session_id).await {
                    return (index, Err(error));
                }
                let outcome = create_one(&store, &factory, &sessions, session_id.clone(), config).await;
                admission.release(&session_id).await;
                (index, outcome)
            });
        }

        let mut results: Vec<Option<Result<Arc<Session>, LiveError>>> =
            (0..total).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, outcome)) => results[index] = Some(outcome),
                Err(_) => {
                    warn!("batch session-creation task panicked");
                }
            }
        }

        results
            .into_iter()
            .map(|entry| {
                entry.unwrap_or_else(|| {
                    Err(LiveError::SessionNotFound("batch task did not complete".into()))
                })
            })
            .collect()
    }

    #[must_use]
    pub fn get(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(session_id).map(|entry| Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn list_all(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Gracefully stops and removes a session.
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::SessionNotFound`] if no such session is tracked.
    pub async fn stop_session(&self, session_id: &SessionId) -> Result<SessionStatus, LiveError> {
        let session = self
            .sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LiveError::SessionNotFound(session_id.to_string()))?;

        let status = session.stop().await;
        self.sessions.remove(session_id);
        let _ = self.store.set_status(session_id.as_str(), "stopped").await;
        Ok(status)
    }

    /// Attempts a graceful `stop()` bounded by [`FORCE_CLEANUP_TIMEOUT`]; on timeout, removes the
    /// session from the index unconditionally and deletes its persisted row (spec.md §4.9
    /// "Force cleanup").
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::SessionNotFound`] if no such session is tracked, or
    /// [`LiveError::ForceCleanupTimedOut`] if `stop()` did not complete within the timeout (the
    /// session is still removed from the index in that case).
    pub async fn force_cleanup(&self, session_id: &SessionId) -> Result<SessionStatus, LiveError> {
        let Some(session) = self.sessions.get(session_id).map(|entry| Arc::clone(entry.value()))
        else {
            return Err(LiveError::SessionNotFound(session_id.to_string()));
        };

        let outcome = tokio::time::timeout(self.force_cleanup_timeout, session.stop()).await;
        self.sessions.remove(session_id);
        let _ = self.store.delete(session_id.as_str()).await;

        match outcome {
            Ok(status) => Ok(status),
            Err(_) => {
                warn!(%session_id, "force_cleanup exceeded timeout; removed unconditionally");
                Err(LiveError::ForceCleanupTimedOut(session_id.to_string()))
            }
        }
    }
}

async fn create_one(
    store: &Arc<dyn SessionStore>,
    factory: &SessionFactory,
    sessions: &Arc<DashMap<SessionId, Arc<Session>>>,
    session_id: SessionId,
    config: SessionConfig,
) -> Result<Arc<Session>, LiveError> {
    let config_json = serde_json::json!({
        "direction": format!("{:?}", config.direction),
        "current_price": config.current_price,
        "upper_bound": config.upper_bound,
        "lower_bound": config.lower_bound,
        "grid_levels": config.grid_levels,
        "total_margin": config.total_margin,
    });

    store
        .insert_creating(session_id.as_str(), &config.user_id, config.instrument.as_str(), config_json)
        .await
        .map_err(|e| match e {
            grid_persistence::PersistenceError::DuplicateRunningSession => {
                LiveError::DuplicateGridSession
            }
            other => other.into(),
        })?;

    let (exchange, ws, fill_rx) = factory(&config);
    let session = match Session::new(session_id.clone(), &config, exchange, ws, fill_rx) {
        Ok(session) => Arc::new(session),
        Err(error) => {
            let _ = store.delete(session_id.as_str()).await;
            return Err(error.into());
        }
    };

    session.start().await;
    if let Err(error) = store.set_status(session_id.as_str(), "running").await {
        warn!(%session_id, %error, "failed to mark session running in persistent store");
    }

    sessions.insert(session_id.clone(), Arc::clone(&session));
    info!(%session_id, "session created");
    Ok(session)
}

/// Recovers the [`InstrumentId`] embedded in a [`SessionId`], used when rehydrating sessions from
/// the persistent store on startup (spec.md §4.11 "Reconciliation on startup").
#[must_use]
pub fn instrument_from_session(session_id: &SessionId) -> Option<InstrumentId> {
    let user_id = session_id.user_id();
    let rest = session_id.as_str().strip_prefix(user_id)?.strip_prefix('_')?;
    InstrumentId::parse(rest).ok()
}
