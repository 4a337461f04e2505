// src/db/mod.rs - In-memory persistence for sessions, telemetry, and audit events
//
// Backs the demo deployment: session rows are updated in place with
// last-write-wins semantics, while metrics and security events are
// append-only. Everything lives behind the controller's backend traits,
// so swapping in a real database touches nothing above this module.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::behavioral::controller::{AnalyzeClient, AnalyzeRequest, SecurityEventSink, SessionBackend};
use crate::behavioral::profile::ProfileStore;
use crate::behavioral::scorer::{self, AnomalyResult};
use crate::behavioral::{BehavioralError, Result};
use crate::models::{
    BehavioralMetric, BehavioralSession, SecurityEvent, SecurityEventType, SessionUpdate,
};

#[derive(Debug, Default)]
pub struct StorageService {
    sessions: RwLock<HashMap<Uuid, BehavioralSession>>,
    metrics: RwLock<Vec<BehavioralMetric>>,
    events: RwLock<Vec<SecurityEvent>>,
}

impl StorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_session(&self, user_id: &str, metadata: Value) -> BehavioralSession {
        let session = BehavioralSession {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            session_start: Utc::now(),
            session_end: None,
            risk_score: Some(0.0),
            anomaly_detected: false,
            feature_vector: None,
            metadata,
        };
        self.sessions.write().insert(session.id, session.clone());
        session
    }

    pub fn get_session(&self, session_id: Uuid) -> Option<BehavioralSession> {
        self.sessions.read().get(&session_id).cloned()
    }

    /// Newest-first list of a user's sessions
    pub fn sessions_for_user(&self, user_id: &str) -> Vec<BehavioralSession> {
        let mut sessions: Vec<BehavioralSession> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.session_start.cmp(&a.session_start));
        sessions
    }

    /// Apply a partial update to a session row. Fields absent from the
    /// update keep their current value; present fields win outright.
    pub fn apply_session_update(
        &self,
        session_id: Uuid,
        update: SessionUpdate,
    ) -> Result<BehavioralSession> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&session_id)
            .ok_or(BehavioralError::SessionNotFound(session_id))?;

        if let Some(end) = update.session_end {
            session.session_end = Some(end);
        }
        if let Some(score) = update.risk_score {
            session.risk_score = Some(score);
        }
        if let Some(flag) = update.anomaly_detected {
            session.anomaly_detected = flag;
        }
        if let Some(vector) = update.feature_vector {
            session.feature_vector = Some(vector);
        }
        Ok(session.clone())
    }

    pub fn record_metric(
        &self,
        session_id: Uuid,
        metric_type: &str,
        data: Value,
    ) -> Result<BehavioralMetric> {
        if !self.sessions.read().contains_key(&session_id) {
            return Err(BehavioralError::SessionNotFound(session_id));
        }
        let metric = BehavioralMetric {
            id: Uuid::new_v4(),
            session_id,
            metric_type: metric_type.to_string(),
            timestamp: Utc::now(),
            data,
        };
        self.metrics.write().push(metric.clone());
        Ok(metric)
    }

    /// Metrics for one session, in arrival order
    pub fn metrics_for_session(&self, session_id: Uuid) -> Vec<BehavioralMetric> {
        self.metrics
            .read()
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn record_event(
        &self,
        user_id: &str,
        event_type: SecurityEventType,
        session_id: Option<Uuid>,
        risk_score: Option<f64>,
        details: Value,
        resolved: bool,
    ) -> SecurityEvent {
        let event = SecurityEvent {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            session_id,
            event_type,
            risk_score,
            details,
            resolved,
            created_at: Utc::now(),
        };
        self.events.write().push(event.clone());
        event
    }

    /// Newest-first slice of a user's audit log
    pub fn events_for_user(&self, user_id: &str, limit: usize) -> Vec<SecurityEvent> {
        let events = self.events.read();
        let mut out: Vec<SecurityEvent> = events
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit);
        out
    }

    pub fn unresolved_anomaly_count(&self, user_id: &str) -> usize {
        self.events
            .read()
            .iter()
            .filter(|e| {
                e.user_id == user_id && e.event_type == SecurityEventType::Anomaly && !e.resolved
            })
            .count()
    }
}

#[async_trait]
impl SessionBackend for StorageService {
    async fn create_session(&self, user_id: &str, metadata: Value) -> Result<Uuid> {
        Ok(self.insert_session(user_id, metadata).id)
    }

    async fn update_session(&self, session_id: Uuid, update: SessionUpdate) -> Result<()> {
        self.apply_session_update(session_id, update)?;
        Ok(())
    }

    async fn push_metric(&self, session_id: Uuid, metric_type: &str, data: Value) -> Result<()> {
        self.record_metric(session_id, metric_type, data)?;
        Ok(())
    }
}

#[async_trait]
impl SecurityEventSink for StorageService {
    async fn log_event(
        &self,
        user_id: &str,
        event_type: SecurityEventType,
        session_id: Option<Uuid>,
        risk_score: Option<f64>,
        details: Value,
        resolved: bool,
    ) -> Result<()> {
        self.record_event(user_id, event_type, session_id, risk_score, details, resolved);
        Ok(())
    }
}

/// In-process scoring backend: resolves the user through the attached
/// session row and scores against that user's stored baseline. A
/// missing session or profile degrades to the neutral result.
pub struct LocalAnalyzer {
    profiles: Arc<dyn ProfileStore>,
    storage: Arc<StorageService>,
}

impl LocalAnalyzer {
    pub fn new(profiles: Arc<dyn ProfileStore>, storage: Arc<StorageService>) -> Self {
        LocalAnalyzer { profiles, storage }
    }
}

#[async_trait]
impl AnalyzeClient for LocalAnalyzer {
    async fn analyze(&self, request: AnalyzeRequest) -> Result<AnomalyResult> {
        let profile = request
            .session_id
            .and_then(|id| self.storage.get_session(id))
            .and_then(|session| self.profiles.get_profile(&session.user_id));

        Ok(scorer::score(
            &request.feature_vector,
            profile.as_ref(),
            &request.mouse_timestamps,
            &request.keystroke_timestamps,
        ))
    }
}
