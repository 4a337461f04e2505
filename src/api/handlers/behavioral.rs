use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::AppState;
use crate::behavioral::controller::AnalyzeRequest;
use crate::behavioral::profile::{ProfileStore, UserProfile};
use crate::behavioral::scorer;
use crate::models::{Recommendation, SecurityEventType, SessionUpdate};

use super::user_id;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRequest {
    pub session_id: Uuid,
    pub metric_type: String,
    #[serde(default)]
    pub data: Value,
}

// Open a new monitored session for the requesting user
pub async fn create_session(
    req: HttpRequest,
    body: web::Json<CreateSessionRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let user = user_id(&req);
    let session = state.storage.insert_session(&user, body.into_inner().metadata);
    HttpResponse::Created().json(session)
}

pub async fn get_session(path: web::Path<Uuid>, state: web::Data<AppState>) -> impl Responder {
    let session_id = path.into_inner();
    match state.storage.get_session(session_id) {
        Some(session) => HttpResponse::Ok().json(session),
        None => HttpResponse::NotFound().json(json!({
            "error": format!("Session not found: {}", session_id)
        })),
    }
}

pub async fn list_sessions(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    let user = user_id(&req);
    HttpResponse::Ok().json(state.storage.sessions_for_user(&user))
}

// Partial update: absent fields keep their current value
pub async fn update_session(
    path: web::Path<Uuid>,
    body: web::Json<SessionUpdate>,
    state: web::Data<AppState>,
) -> impl Responder {
    let session_id = path.into_inner();
    match state.storage.apply_session_update(session_id, body.into_inner()) {
        Ok(session) => HttpResponse::Ok().json(session),
        Err(e) => HttpResponse::NotFound().json(json!({ "error": e.to_string() })),
    }
}

pub async fn push_metric(
    body: web::Json<MetricRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let body = body.into_inner();
    match state
        .storage
        .record_metric(body.session_id, &body.metric_type, body.data)
    {
        Ok(metric) => HttpResponse::Created().json(metric),
        Err(e) => HttpResponse::NotFound().json(json!({ "error": e.to_string() })),
    }
}

pub async fn list_metrics(path: web::Path<Uuid>, state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.storage.metrics_for_session(path.into_inner()))
}

/// Score a behavior window against the requesting user's baseline.
/// The verdict is persisted onto the attached session row, and an
/// anomalous verdict lands in the audit log before the response goes
/// out.
pub async fn analyze(
    req: HttpRequest,
    body: web::Json<AnalyzeRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let user = user_id(&req);
    let request = body.into_inner();

    if let Some(session_id) = request.session_id {
        if state.storage.get_session(session_id).is_none() {
            return HttpResponse::NotFound().json(json!({
                "error": format!("Session not found: {}", session_id)
            }));
        }
    }

    let profile = state.profiles.get_profile(&user);
    let result = scorer::score(
        &request.feature_vector,
        profile.as_ref(),
        &request.mouse_timestamps,
        &request.keystroke_timestamps,
    );

    if let Some(session_id) = request.session_id {
        let update = SessionUpdate {
            risk_score: Some(result.anomaly_score),
            anomaly_detected: Some(result.is_anomalous),
            feature_vector: serde_json::to_value(request.feature_vector).ok(),
            ..SessionUpdate::default()
        };
        if let Err(e) = state.storage.apply_session_update(session_id, update) {
            log::debug!("failed to persist analysis verdict: {}", e);
        }
    }

    if result.is_anomalous {
        state.storage.record_event(
            &user,
            SecurityEventType::Anomaly,
            request.session_id,
            Some(result.anomaly_score),
            json!({ "details": result.details }),
            false,
        );
        if result.recommendation == Recommendation::RequireReauth {
            state.storage.record_event(
                &user,
                SecurityEventType::ReauthRequired,
                request.session_id,
                Some(result.anomaly_score),
                json!({ "reason": "behavioral_anomaly" }),
                false,
            );
        }
    }

    HttpResponse::Ok().json(result)
}

pub async fn get_profile(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    let user = user_id(&req);
    match state.profiles.get_profile(&user) {
        Some(profile) => HttpResponse::Ok().json(profile),
        None => HttpResponse::NotFound().json(json!({
            "error": format!("No behavioral profile for user: {}", user)
        })),
    }
}

// Stand-in for the offline baseline learner
pub async fn upsert_profile(
    req: HttpRequest,
    body: web::Json<UserProfile>,
    state: web::Data<AppState>,
) -> impl Responder {
    let user = user_id(&req);
    state.profiles.upsert_profile(&user, body.into_inner());
    HttpResponse::Ok().json(json!({ "userId": user, "updated": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::register_routes;
    use actix_web::{test, App};

    fn baseline_profile() -> UserProfile {
        UserProfile {
            mouse_velocity_mean: 1.0,
            mouse_velocity_std: 0.2,
            dwell_time_mean: 100.0,
            dwell_time_std: 20.0,
            flight_time_mean: 50.0,
            flight_time_std: 10.0,
            touch_pressure_mean: 0.5,
            touch_pressure_std: 0.1,
        }
    }

    macro_rules! spawn_app {
        ($state:expr) => {
            test::init_service(App::new().app_data($state).configure(register_routes)).await
        };
    }

    #[actix_web::test]
    async fn test_session_round_trip() {
        let state = web::Data::new(AppState::new());
        let app = spawn_app!(state.clone());

        let req = test::TestRequest::post()
            .uri("/api/v1/behavioral/session")
            .set_json(json!({ "metadata": { "device": "laptop" } }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(created["userId"], "demo-user");
        assert_eq!(created["riskScore"], 0.0);
        let id = created["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/behavioral/session/{}", id))
            .to_request();
        let fetched: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(fetched["metadata"]["device"], "laptop");
    }

    #[actix_web::test]
    async fn test_patch_unknown_session_is_404() {
        let state = web::Data::new(AppState::new());
        let app = spawn_app!(state);

        let req = test::TestRequest::patch()
            .uri(&format!("/api/v1/behavioral/session/{}", Uuid::new_v4()))
            .set_json(json!({ "riskScore": 0.5 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn test_metric_requires_existing_session() {
        let state = web::Data::new(AppState::new());
        let app = spawn_app!(state.clone());

        let req = test::TestRequest::post()
            .uri("/api/v1/behavioral/metric")
            .set_json(json!({
                "sessionId": Uuid::new_v4(),
                "metricType": "comprehensive",
                "data": {}
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);

        let session = state.storage.insert_session("demo-user", json!({}));
        let req = test::TestRequest::post()
            .uri("/api/v1/behavioral/metric")
            .set_json(json!({
                "sessionId": session.id,
                "metricType": "comprehensive",
                "data": { "tick": 1 }
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);
        assert_eq!(state.storage.metrics_for_session(session.id).len(), 1);
    }

    #[actix_web::test]
    async fn test_analyze_without_profile_is_neutral() {
        let state = web::Data::new(AppState::new());
        let app = spawn_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/v1/behavioral/analyze")
            .set_json(json!({
                "featureVector": [5.0, 300.0, 10.0, 0.9, 40.0, 20.0, 5.0, 60000.0]
            }))
            .to_request();
        let verdict: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(verdict["anomalyScore"], 0.0);
        assert_eq!(verdict["isAnomalous"], false);
        assert_eq!(verdict["recommendation"], "continue");
    }

    #[actix_web::test]
    async fn test_analyze_persists_verdict_and_audit_trail() {
        let state = web::Data::new(AppState::new());
        state.profiles.upsert_profile("demo-user", baseline_profile());
        let session = state.storage.insert_session("demo-user", json!({}));
        let app = spawn_app!(state.clone());

        let req = test::TestRequest::post()
            .uri("/api/v1/behavioral/analyze")
            .set_json(json!({
                "featureVector": [3.0, 100.0, 50.0, 0.5, 40.0, 20.0, 5.0, 60000.0],
                "mouseTimestamps": [0, 10, 500, 520, 2000, 2050],
                "sessionId": session.id
            }))
            .to_request();
        let verdict: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(verdict["isAnomalous"], true);
        assert_eq!(verdict["recommendation"], "require_reauth");

        let updated = state.storage.get_session(session.id).unwrap();
        assert!(updated.anomaly_detected);
        assert!(updated.feature_vector.is_some());
        assert!(updated.risk_score.unwrap() > 0.8);

        let events = state.storage.events_for_user("demo-user", 10);
        assert!(events
            .iter()
            .any(|e| e.event_type == SecurityEventType::Anomaly));
        assert!(events
            .iter()
            .any(|e| e.event_type == SecurityEventType::ReauthRequired));
    }

    #[actix_web::test]
    async fn test_analyze_rejects_malformed_feature_vector() {
        let state = web::Data::new(AppState::new());
        let app = spawn_app!(state);

        // 7 dimensions instead of 8
        let req = test::TestRequest::post()
            .uri("/api/v1/behavioral/analyze")
            .set_json(json!({
                "featureVector": [1.0, 2.0, 3.0, 0.5, 10.0, 5.0, 2.0]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_profile_upsert_and_fetch() {
        let state = web::Data::new(AppState::new());
        let app = spawn_app!(state);

        let req = test::TestRequest::get()
            .uri("/api/v1/behavioral/profile")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);

        let req = test::TestRequest::put()
            .uri("/api/v1/behavioral/profile")
            .insert_header(("X-User-Id", "alice"))
            .set_json(baseline_profile())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let req = test::TestRequest::get()
            .uri("/api/v1/behavioral/profile")
            .insert_header(("X-User-Id", "alice"))
            .to_request();
        let profile: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(profile["dwellTimeMean"], 100.0);
    }
}
