pub mod handlers;
pub mod routes;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::sync::Arc;

use crate::behavioral::profile::{InMemoryProfileStore, UserProfile};
use crate::db::StorageService;

/// Shared state handed to every handler
pub struct AppState {
    pub storage: Arc<StorageService>,
    pub profiles: Arc<InMemoryProfileStore>,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            storage: Arc::new(StorageService::new()),
            profiles: Arc::new(InMemoryProfileStore::new()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn start_api_server(config: crate::config::Config) -> std::io::Result<()> {
    let server_address = format!("{}:{}", config.api.host, config.api.port);

    log::info!("Starting API server on {}", server_address);

    let state = web::Data::new(AppState::new());
    // Seed the demo account so the analyze path has a baseline to
    // score against out of the box
    state
        .profiles
        .upsert_profile("demo-user", UserProfile::demo_baseline());

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.api.cors_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
            .allowed_headers(vec!["Authorization", "Content-Type", "X-User-Id"])
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(routes::register_routes)
    })
    .bind(server_address)?
    .workers(config.api.workers)
    .run()
    .await
}
