// src/behavioral/controller.rs - Session/risk state machine
//
// Owns the sampler and drives the periodic extract -> score -> decide
// loop for exactly one monitored session. Collaborators are injected
// behind async traits so the scorer can be local or remote.
//
// Failure policy: the analyze call is the only network call the
// controller waits on, and it fails OPEN - transport errors and
// timeouts degrade to a neutral result instead of escalating risk.
// Session updates, metric pushes, and audit writes are best-effort;
// losing one is acceptable and never surfaces to the user.

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::features::{self, FeatureVector};
use super::sampler::EventSampler;
use super::scorer::AnomalyResult;
use super::{BehavioralError, Result};
use crate::models::{Recommendation, SecurityEventType, SecurityStatus, SessionUpdate};

/// One scoring request: the reduced feature vector plus the raw
/// timestamp series the temporal-irregularity blend needs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub feature_vector: FeatureVector,
    #[serde(default)]
    pub mouse_timestamps: Vec<u64>,
    #[serde(default)]
    pub keystroke_timestamps: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

/// Scoring boundary. The controller awaits this call (with a timeout)
/// before updating visible risk state.
#[async_trait]
pub trait AnalyzeClient: Send + Sync {
    async fn analyze(&self, request: AnalyzeRequest) -> Result<AnomalyResult>;
}

/// Append-only audit sink
#[async_trait]
pub trait SecurityEventSink: Send + Sync {
    async fn log_event(
        &self,
        user_id: &str,
        event_type: SecurityEventType,
        session_id: Option<Uuid>,
        risk_score: Option<f64>,
        details: Value,
        resolved: bool,
    ) -> Result<()>;
}

/// Session row and telemetry boundary
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn create_session(&self, user_id: &str, metadata: Value) -> Result<Uuid>;
    async fn update_session(&self, session_id: Uuid, update: SessionUpdate) -> Result<()>;
    async fn push_metric(&self, session_id: Uuid, metric_type: &str, data: Value) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Monitoring,
    Critical,
    Reauth,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorState::Idle => write!(f, "idle"),
            MonitorState::Monitoring => write!(f, "monitoring"),
            MonitorState::Critical => write!(f, "critical"),
            MonitorState::Reauth => write!(f, "reauth"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReauthMethod {
    Pin,
    Biometric,
    Sms,
}

impl fmt::Display for ReauthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReauthMethod::Pin => write!(f, "pin"),
            ReauthMethod::Biometric => write!(f, "biometric"),
            ReauthMethod::Sms => write!(f, "sms"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Period of the extract -> score loop
    pub tick_interval: Duration,
    /// Budget for the analyze round trip before failing open
    pub analyze_timeout: Duration,
    /// Trailing raw events per modality in each metric report
    pub metric_report_events: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            tick_interval: Duration::from_secs(15),
            analyze_timeout: Duration::from_secs(5),
            metric_report_events: 10,
        }
    }
}

#[derive(Debug)]
struct RiskState {
    mode: MonitorState,
    risk_score: f64,
    anomaly_detected: bool,
    session_id: Option<Uuid>,
}

struct ControllerInner {
    user_id: String,
    config: MonitorConfig,
    sampler: Mutex<EventSampler>,
    state: Mutex<RiskState>,
    /// Bumped on every start/stop; an analysis round trip that comes
    /// back under a stale epoch is discarded, so a late score can never
    /// reopen a closed session or resurrect risk state
    epoch: AtomicU64,
    analyzer: Arc<dyn AnalyzeClient>,
    events: Arc<dyn SecurityEventSink>,
    backend: Arc<dyn SessionBackend>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
}

/// One owned controller per monitored session; consumers receive it by
/// injection rather than through ambient global state.
pub struct RiskController {
    inner: Arc<ControllerInner>,
}

impl RiskController {
    pub fn new(
        user_id: &str,
        analyzer: Arc<dyn AnalyzeClient>,
        events: Arc<dyn SecurityEventSink>,
        backend: Arc<dyn SessionBackend>,
        config: MonitorConfig,
    ) -> Self {
        RiskController {
            inner: Arc::new(ControllerInner {
                user_id: user_id.to_string(),
                config,
                sampler: Mutex::new(EventSampler::new(now_ms())),
                state: Mutex::new(RiskState {
                    mode: MonitorState::Idle,
                    risk_score: 0.0,
                    anomaly_detected: false,
                    session_id: None,
                }),
                epoch: AtomicU64::new(0),
                analyzer,
                events,
                backend,
                tick_task: Mutex::new(None),
            }),
        }
    }

    /// Begin monitoring: opens a behavioral session and starts the
    /// periodic analysis loop.
    pub async fn start(&self, metadata: Value) -> Result<Uuid> {
        {
            let state = self.inner.state.lock();
            if state.mode != MonitorState::Idle {
                return Err(BehavioralError::InvalidState(format!(
                    "cannot start monitoring from state {}",
                    state.mode
                )));
            }
        }

        let session_id = self
            .inner
            .backend
            .create_session(&self.inner.user_id, metadata)
            .await?;

        {
            let mut sampler = self.inner.sampler.lock();
            *sampler = EventSampler::new(now_ms());
        }
        {
            let mut state = self.inner.state.lock();
            state.mode = MonitorState::Monitoring;
            state.risk_score = 0.0;
            state.anomaly_detected = false;
            state.session_id = Some(session_id);
        }
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);

        let inner = Arc::clone(&self.inner);
        let tick = self.inner.config.tick_interval;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; analysis starts one
            // period in
            interval.tick().await;
            loop {
                interval.tick().await;
                ControllerInner::run_analysis(&inner).await;
            }
        });
        *self.inner.tick_task.lock() = Some(handle);

        debug!(
            "monitoring started for user {} (session {})",
            self.inner.user_id, session_id
        );
        Ok(session_id)
    }

    /// Stop monitoring: cancels the analysis loop, closes the session
    /// best-effort, and resets risk state. Never fails - teardown must
    /// not block navigation away.
    pub async fn stop(&self) {
        if let Some(handle) = self.inner.tick_task.lock().take() {
            handle.abort();
        }
        // Invalidate any analysis round trip still in flight
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);

        let session_id = {
            let mut state = self.inner.state.lock();
            let id = state.session_id.take();
            state.mode = MonitorState::Idle;
            state.risk_score = 0.0;
            state.anomaly_detected = false;
            id
        };

        if let Some(session_id) = session_id {
            let update = SessionUpdate {
                session_end: Some(Utc::now()),
                risk_score: Some(0.0),
                ..SessionUpdate::default()
            };
            if let Err(e) = self.inner.backend.update_session(session_id, update).await {
                debug!("failed to close session {} on stop: {}", session_id, e);
            }
        }
    }

    // Passive capture entry points; these only touch the sampler's
    // buffers and never block input handling.

    pub fn record_mouse_move(&self, x: f64, y: f64, timestamp_ms: u64, pressure: Option<f64>) {
        self.inner
            .sampler
            .lock()
            .record_mouse_move(x, y, timestamp_ms, pressure);
    }

    pub fn record_key_down(&self, key: &str, timestamp_ms: u64) {
        self.inner.sampler.lock().record_key_down(key, timestamp_ms);
    }

    pub fn record_key_up(&self, key: &str, timestamp_ms: u64, pressure: Option<f64>) {
        self.inner
            .sampler
            .lock()
            .record_key_up(key, timestamp_ms, pressure);
    }

    pub fn record_touch(
        &self,
        x: f64,
        y: f64,
        timestamp_ms: u64,
        force: Option<f64>,
        radii: Option<(f64, f64)>,
    ) {
        self.inner
            .sampler
            .lock()
            .record_touch(x, y, timestamp_ms, force, radii);
    }

    pub fn record_touch_end(&self, timestamp_ms: u64) {
        self.inner.sampler.lock().record_touch_end(timestamp_ms);
    }

    /// Run one extract -> score -> decide round now. The timer calls
    /// this on every tick; tests call it directly.
    pub async fn run_analysis_once(&self) {
        ControllerInner::run_analysis(&self.inner).await;
    }

    /// Acknowledge the critical alert without verifying. Returns to
    /// Monitoring; nothing is persisted.
    pub fn dismiss_alert(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.mode != MonitorState::Critical {
            return Err(BehavioralError::InvalidState(format!(
                "cannot dismiss from state {}",
                state.mode
            )));
        }
        state.mode = MonitorState::Monitoring;
        debug!("critical alert dismissed by user {}", self.inner.user_id);
        Ok(())
    }

    /// Enter the re-authentication flow with the chosen method
    pub async fn begin_reauth(&self, method: ReauthMethod) -> Result<()> {
        let (session_id, risk_score) = {
            let mut state = self.inner.state.lock();
            if state.mode != MonitorState::Critical {
                return Err(BehavioralError::InvalidState(format!(
                    "cannot begin re-authentication from state {}",
                    state.mode
                )));
            }
            state.mode = MonitorState::Reauth;
            (state.session_id, state.risk_score)
        };

        if let Err(e) = self
            .inner
            .events
            .log_event(
                &self.inner.user_id,
                SecurityEventType::ReauthAttempt,
                session_id,
                Some(risk_score),
                json!({ "method": method.to_string() }),
                false,
            )
            .await
        {
            debug!("failed to log reauth attempt: {}", e);
        }
        Ok(())
    }

    /// Complete re-authentication. Any method is an equivalent proof of
    /// presence: well-formed input succeeds deterministically, while
    /// malformed input is rejected locally with no state transition.
    pub async fn complete_reauth(&self, method: ReauthMethod, input: &str) -> Result<()> {
        {
            let state = self.inner.state.lock();
            if state.mode != MonitorState::Reauth {
                return Err(BehavioralError::InvalidState(format!(
                    "cannot complete re-authentication from state {}",
                    state.mode
                )));
            }
        }
        validate_reauth_input(method, input)?;

        let (session_id, previous_risk) = {
            let mut state = self.inner.state.lock();
            let snapshot = (state.session_id, state.risk_score);
            state.mode = MonitorState::Monitoring;
            state.risk_score = 0.0;
            state.anomaly_detected = false;
            snapshot
        };

        if let Err(e) = self
            .inner
            .events
            .log_event(
                &self.inner.user_id,
                SecurityEventType::ReauthSuccess,
                session_id,
                Some(previous_risk),
                json!({
                    "method": method.to_string(),
                    "previousRiskScore": previous_risk,
                }),
                true,
            )
            .await
        {
            debug!("failed to log reauth success: {}", e);
        }
        Ok(())
    }

    pub fn state(&self) -> MonitorState {
        self.inner.state.lock().mode
    }

    pub fn risk_score(&self) -> f64 {
        self.inner.state.lock().risk_score
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.inner.state.lock().session_id
    }

    /// Derived on every read from the current risk score and anomaly
    /// flag, never stored independently
    pub fn security_status(&self) -> SecurityStatus {
        let state = self.inner.state.lock();
        if state.anomaly_detected {
            SecurityStatus::Critical
        } else if state.risk_score > 0.6 {
            SecurityStatus::Warning
        } else {
            SecurityStatus::Secure
        }
    }
}

impl ControllerInner {
    async fn run_analysis(inner: &Arc<ControllerInner>) {
        let epoch = inner.epoch.load(Ordering::SeqCst);

        let (vector, bundle, mouse_ts, key_ts, recent, session_id) = {
            let state = inner.state.lock();
            if !matches!(state.mode, MonitorState::Monitoring | MonitorState::Critical) {
                return;
            }
            let session_id = state.session_id;
            drop(state);

            let sampler = inner.sampler.lock();
            let (vector, bundle) = features::extract(&sampler, now_ms());
            (
                vector,
                bundle,
                sampler.mouse_timestamps(),
                sampler.keystroke_timestamps(),
                sampler.recent_events(inner.config.metric_report_events),
                session_id,
            )
        };

        // Best-effort telemetry: a lost report is acceptable
        if let Some(session_id) = session_id {
            let payload = json!({
                "features": bundle,
                "featureVector": vector,
                "rawEvents": recent,
            });
            if let Err(e) = inner
                .backend
                .push_metric(session_id, "comprehensive", payload)
                .await
            {
                debug!("metric push failed: {}", e);
            }
        }

        let request = AnalyzeRequest {
            feature_vector: vector,
            mouse_timestamps: mouse_ts,
            keystroke_timestamps: key_ts,
            session_id,
        };
        let result = match tokio::time::timeout(
            inner.config.analyze_timeout,
            inner.analyzer.analyze(request),
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!("analysis failed, treating as non-anomalous: {}", e);
                AnomalyResult::neutral()
            }
            Err(_) => {
                warn!(
                    "analysis timed out after {:?}, treating as non-anomalous",
                    inner.config.analyze_timeout
                );
                AnomalyResult::neutral()
            }
        };

        if inner.epoch.load(Ordering::SeqCst) != epoch {
            debug!("discarding analysis result from a closed monitoring window");
            return;
        }

        let became_critical = {
            let mut state = inner.state.lock();
            if state.mode == MonitorState::Idle || state.mode == MonitorState::Reauth {
                return;
            }
            state.risk_score = result.anomaly_score;
            state.anomaly_detected = result.is_anomalous;
            if result.is_anomalous && state.mode == MonitorState::Monitoring {
                state.mode = MonitorState::Critical;
                true
            } else {
                false
            }
        };

        if let Some(session_id) = session_id {
            let update = SessionUpdate {
                risk_score: Some(result.anomaly_score),
                anomaly_detected: Some(result.is_anomalous),
                feature_vector: serde_json::to_value(vector).ok(),
                ..SessionUpdate::default()
            };
            if let Err(e) = inner.backend.update_session(session_id, update).await {
                debug!("session update failed: {}", e);
            }
        }

        if became_critical {
            warn!(
                "behavioral anomaly for user {}: score {:.3}",
                inner.user_id, result.anomaly_score
            );
            if let Err(e) = inner
                .events
                .log_event(
                    &inner.user_id,
                    SecurityEventType::Anomaly,
                    session_id,
                    Some(result.anomaly_score),
                    json!({
                        "threshold": result.threshold,
                        "recommendation": result.recommendation.to_string(),
                        "details": result.details,
                    }),
                    false,
                )
                .await
            {
                debug!("failed to log anomaly event: {}", e);
            }

            if result.recommendation == Recommendation::RequireReauth {
                if let Err(e) = inner
                    .events
                    .log_event(
                        &inner.user_id,
                        SecurityEventType::ReauthRequired,
                        session_id,
                        Some(result.anomaly_score),
                        json!({ "reason": "behavioral_anomaly" }),
                        false,
                    )
                    .await
                {
                    debug!("failed to log reauth requirement: {}", e);
                }
            }
        }
    }
}

impl Drop for RiskController {
    fn drop(&mut self) {
        // Guarantee no dangling timer outlives the controller
        if let Some(handle) = self.inner.tick_task.lock().take() {
            handle.abort();
        }
    }
}

fn validate_reauth_input(method: ReauthMethod, input: &str) -> Result<()> {
    match method {
        ReauthMethod::Pin | ReauthMethod::Sms => {
            if input.len() == 6 && input.chars().all(|c| c.is_ascii_digit()) {
                Ok(())
            } else {
                Err(BehavioralError::InvalidReauthInput(format!(
                    "expected a 6-digit code for {} verification",
                    method
                )))
            }
        }
        // Proof of presence with no code to validate
        ReauthMethod::Biometric => Ok(()),
    }
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}
