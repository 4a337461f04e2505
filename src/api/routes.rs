use actix_web::web;

use super::handlers::{behavioral, security};

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    // API version prefix - all routes live under /api/v1
    cfg.service(
        web::scope("/api/v1")
            // Behavioral monitoring routes
            .service(
                web::scope("/behavioral")
                    .route("/session", web::post().to(behavioral::create_session))
                    .route("/sessions", web::get().to(behavioral::list_sessions))
                    .route("/session/{id}", web::get().to(behavioral::get_session))
                    .route("/session/{id}", web::patch().to(behavioral::update_session))
                    .route("/metric", web::post().to(behavioral::push_metric))
                    .route("/metrics/{session_id}", web::get().to(behavioral::list_metrics))
                    .route("/analyze", web::post().to(behavioral::analyze))
                    .route("/profile", web::get().to(behavioral::get_profile))
                    .route("/profile", web::put().to(behavioral::upsert_profile)),
            )
            // Security audit routes
            .service(
                web::scope("/security")
                    .route("/event", web::post().to(security::log_event))
                    .route("/events", web::get().to(security::list_events)),
            )
            // Dashboard analytics
            .route("/analytics/dashboard", web::get().to(security::dashboard)),
    );
}
