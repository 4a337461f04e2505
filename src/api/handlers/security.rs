use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::AppState;
use crate::models::SecurityEventType;

use super::user_id;

/// Baseline of the dashboard health score before anomaly penalties
const SECURITY_SCORE_BASE: i64 = 95;
/// Penalty per unresolved anomaly
const SECURITY_SCORE_PENALTY: i64 = 5;
/// The score never drops below this floor
const SECURITY_SCORE_FLOOR: i64 = 70;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEventRequest {
    pub event_type: String,
    pub session_id: Option<Uuid>,
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub details: Value,
    #[serde(default)]
    pub resolved: bool,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

// Append an entry to the audit log
pub async fn log_event(
    req: HttpRequest,
    body: web::Json<LogEventRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let user = user_id(&req);
    let body = body.into_inner();

    let event_type: SecurityEventType = match body.event_type.parse() {
        Ok(t) => t,
        Err(e) => return HttpResponse::BadRequest().json(json!({ "error": e })),
    };

    let event = state.storage.record_event(
        &user,
        event_type,
        body.session_id,
        body.risk_score,
        body.details,
        body.resolved,
    );
    HttpResponse::Created().json(event)
}

pub async fn list_events(
    req: HttpRequest,
    query: web::Query<EventsQuery>,
    state: web::Data<AppState>,
) -> impl Responder {
    let user = user_id(&req);
    let limit = query.limit.unwrap_or(50);
    HttpResponse::Ok().json(state.storage.events_for_user(&user, limit))
}

/// Dashboard summary: a derived health score plus the raw counts
/// behind it. Each unresolved anomaly costs 5 points off a base of 95,
/// floored at 70.
pub async fn dashboard(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    let user = user_id(&req);

    let anomaly_count = state.storage.unresolved_anomaly_count(&user) as i64;
    let security_score =
        (SECURITY_SCORE_BASE - SECURITY_SCORE_PENALTY * anomaly_count).max(SECURITY_SCORE_FLOOR);

    let risk_level = match anomaly_count {
        0 => "low",
        1..=2 => "medium",
        _ => "high",
    };

    let sessions = state.storage.sessions_for_user(&user);
    let active_sessions = sessions.iter().filter(|s| s.session_end.is_none()).count();
    let today = chrono::Utc::now().date_naive();
    let sessions_today = sessions
        .iter()
        .filter(|s| s.session_start.date_naive() == today)
        .count();

    HttpResponse::Ok().json(json!({
        "securityScore": security_score,
        "riskLevel": risk_level,
        "anomalyCount": anomaly_count,
        "activeSessions": active_sessions,
        "sessionsToday": sessions_today,
        "totalSessions": sessions.len(),
        "recentEvents": state.storage.events_for_user(&user, 10),
    }))
}
