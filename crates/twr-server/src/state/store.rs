//! In-memory application state.
//!
//! The engine sits behind one mutex: candidate selection, check
//! evaluation, queue removal, slot occupancy and the audit hand-off all
//! happen under that lock, so concurrent decisions can never claim the
//! same request or the same low-visibility slot. Reference data is an
//! `Arc` snapshot swapped atomically behind an `RwLock`; a decision
//! clones the `Arc` once and sees a consistent snapshot throughout.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;

use twr_core::engine::{Authorization, AuthorizationEngine, EngineError};
use twr_core::models::{
    AuthorizationResult, EngineStatus, OperationRequest, ReferenceData, RequestId,
};
use twr_core::rules::OperationRules;

use crate::audit::ChannelAuditSink;
use crate::config::Config;
use crate::persistence::{audit as audit_db, Database};

/// Cache bound; older decisions are evicted, the database keeps them.
const AUDIT_CACHE_LIMIT: usize = 200;
/// Number of decisions warmed into the cache at startup.
const AUDIT_CACHE_WARM_LIMIT: i64 = AUDIT_CACHE_LIMIT as i64;

pub struct AppState {
    config: Config,
    rules: OperationRules,
    engine: Mutex<AuthorizationEngine<ChannelAuditSink>>,
    reference: RwLock<Arc<ReferenceData>>,
    /// Write-through cache of decided results, keyed by decision sequence.
    decisions: DashMap<u64, AuthorizationResult>,
    decision_seq: AtomicU64,
    database: Database,
}

impl AppState {
    /// Build the state and hand back the audit channel receiver for the
    /// persist loop.
    pub fn new(
        config: Config,
        database: Database,
        reference: ReferenceData,
    ) -> (Self, mpsc::UnboundedReceiver<AuthorizationResult>) {
        let (sink, rx) = ChannelAuditSink::new();
        let rules = OperationRules::default();
        let state = Self {
            config,
            engine: Mutex::new(AuthorizationEngine::new(rules.clone(), sink)),
            rules,
            reference: RwLock::new(Arc::new(reference)),
            decisions: DashMap::new(),
            decision_seq: AtomicU64::new(1),
            database,
        };
        (state, rx)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rules(&self) -> &OperationRules {
        &self.rules
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Warm the decision cache from the durable audit log.
    pub async fn load_from_database(&self) -> anyhow::Result<()> {
        let mut records =
            audit_db::load_recent(self.database.pool(), AUDIT_CACHE_WARM_LIMIT).await?;
        records.reverse(); // oldest first so sequence numbers ascend
        for record in records {
            let seq = self.decision_seq.fetch_add(1, Ordering::SeqCst);
            self.decisions.insert(seq, record);
        }
        Ok(())
    }

    /// Current reference snapshot.
    pub fn reference(&self) -> Arc<ReferenceData> {
        self.reference
            .read()
            .expect("reference lock poisoned")
            .clone()
    }

    /// Swap in a freshly loaded snapshot.
    pub fn replace_reference(&self, data: ReferenceData) {
        *self.reference.write().expect("reference lock poisoned") = Arc::new(data);
    }

    /// Drop NOTAMs whose window ended before `now`. Returns how many were
    /// removed.
    pub fn sweep_expired_notams(&self, now: chrono::DateTime<chrono::Utc>) -> usize {
        let mut guard = self.reference.write().expect("reference lock poisoned");
        let before = guard.notams.len();
        if guard.notams.iter().all(|n| n.end >= now) {
            return 0;
        }
        let mut data = (**guard).clone();
        data.notams.retain(|n| n.end >= now);
        let removed = before - data.notams.len();
        *guard = Arc::new(data);
        removed
    }

    pub fn enqueue(&self, request: OperationRequest) -> Result<(), EngineError> {
        self.engine
            .lock()
            .expect("engine lock poisoned")
            .enqueue(request)
    }

    /// Run one decision against the current snapshot.
    pub fn authorize_next(&self, decision_time: chrono::DateTime<chrono::Utc>) -> Authorization {
        let refdata = self.reference();
        let mut engine = self.engine.lock().expect("engine lock poisoned");
        let authorization = engine.authorize_next(&refdata, decision_time);
        // Sequence assignment stays inside the critical section so cache
        // order always matches decision order.
        if let Authorization::Decided(result) = &authorization {
            self.cache_decision(result);
        }
        authorization
    }

    fn cache_decision(&self, result: &AuthorizationResult) {
        let seq = self.decision_seq.fetch_add(1, Ordering::SeqCst);
        self.decisions.insert(seq, result.clone());
        while self.decisions.len() > AUDIT_CACHE_LIMIT {
            let Some(oldest) = self.decisions.iter().map(|e| *e.key()).min() else {
                break;
            };
            self.decisions.remove(&oldest);
        }
    }

    pub fn complete_operation(&self, id: &RequestId) -> bool {
        self.engine
            .lock()
            .expect("engine lock poisoned")
            .complete_operation(id)
    }

    pub fn status(&self) -> EngineStatus {
        self.engine.lock().expect("engine lock poisoned").status()
    }

    /// Pending requests in serving order.
    pub fn pending(&self) -> Vec<OperationRequest> {
        self.engine.lock().expect("engine lock poisoned").pending()
    }

    /// Cached decisions, newest first.
    pub fn recent_decisions(&self, limit: usize) -> Vec<(u64, AuthorizationResult)> {
        let mut entries: Vec<(u64, AuthorizationResult)> = self
            .decisions
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        entries.truncate(limit);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use twr_core::models::{Decision, OperationKind, PriorityClass};

    async fn setup_state() -> (AppState, mpsc::UnboundedReceiver<AuthorizationResult>) {
        let mut config = Config::from_env();
        config.database_path = std::env::temp_dir()
            .join(format!("twr-store-{}.db", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .to_string();
        let db = crate::persistence::init_database(&config.database_path, 1)
            .await
            .expect("init db");
        AppState::new(config, db, ReferenceData::default())
    }

    fn result(n: u64) -> AuthorizationResult {
        AuthorizationResult {
            request: RequestId::new(format!("ALT{n:03}"), OperationKind::Takeoff),
            priority: PriorityClass::Takeoff,
            decision: Decision::Authorized,
            reason: None,
            runway: Some("10/28".into()),
            decided_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn decision_cache_is_bounded_and_newest_first() {
        let (state, _rx) = setup_state().await;
        let total = AUDIT_CACHE_LIMIT as u64 + 50;
        for n in 0..total {
            state.cache_decision(&result(n));
        }

        assert_eq!(state.decisions.len(), AUDIT_CACHE_LIMIT);
        let recent = state.recent_decisions(5);
        assert_eq!(recent[0].1.request.flight, format!("ALT{:03}", total - 1));
        for pair in recent.windows(2) {
            assert!(pair[0].0 > pair[1].0);
        }
    }
}
