// src/models.rs - Shared data models for behavioral monitoring
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Category of a security event in the append-only audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    Anomaly,
    ReauthRequired,
    ReauthAttempt,
    ReauthSuccess,
    Login,
    Logout,
}

impl fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityEventType::Anomaly => write!(f, "anomaly"),
            SecurityEventType::ReauthRequired => write!(f, "reauth_required"),
            SecurityEventType::ReauthAttempt => write!(f, "reauth_attempt"),
            SecurityEventType::ReauthSuccess => write!(f, "reauth_success"),
            SecurityEventType::Login => write!(f, "login"),
            SecurityEventType::Logout => write!(f, "logout"),
        }
    }
}

impl FromStr for SecurityEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anomaly" => Ok(SecurityEventType::Anomaly),
            "reauth_required" => Ok(SecurityEventType::ReauthRequired),
            "reauth_attempt" => Ok(SecurityEventType::ReauthAttempt),
            "reauth_success" => Ok(SecurityEventType::ReauthSuccess),
            "login" => Ok(SecurityEventType::Login),
            "logout" => Ok(SecurityEventType::Logout),
            _ => Err(format!("Invalid security event type: {}", s)),
        }
    }
}

/// What the scorer advises the session controller to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Continue,
    RequireReauth,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Continue => write!(f, "continue"),
            Recommendation::RequireReauth => write!(f, "require_reauth"),
        }
    }
}

/// UI-facing security status. Always derived from the current risk
/// score and anomaly flag, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityStatus {
    Secure,
    Warning,
    Critical,
}

impl fmt::Display for SecurityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityStatus::Secure => write!(f, "secure"),
            SecurityStatus::Warning => write!(f, "warning"),
            SecurityStatus::Critical => write!(f, "critical"),
        }
    }
}

/// One monitored user session. Created when monitoring starts, updated
/// in place on every analysis tick, closed when monitoring stops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehavioralSession {
    pub id: Uuid,
    pub user_id: String,
    pub session_start: DateTime<Utc>,
    pub session_end: Option<DateTime<Utc>>,
    pub risk_score: Option<f64>,
    pub anomaly_detected: bool,
    pub feature_vector: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
}

/// Partial, last-write-wins update to a behavioral session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub session_end: Option<DateTime<Utc>>,
    pub risk_score: Option<f64>,
    pub anomaly_detected: Option<bool>,
    pub feature_vector: Option<serde_json::Value>,
}

/// Append-only telemetry sample pushed during a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehavioralMetric {
    pub id: Uuid,
    pub session_id: Uuid,
    pub metric_type: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

/// Entry in the append-only security audit log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub id: Uuid,
    pub user_id: String,
    pub session_id: Option<Uuid>,
    pub event_type: SecurityEventType,
    pub risk_score: Option<f64>,
    pub details: serde_json::Value,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}
