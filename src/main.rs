use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use rand::Rng;
use serde_json::json;
use std::sync::Arc;

use secure_bank::behavioral::profile::InMemoryProfileStore;
use secure_bank::{api, config, utils};
use secure_bank::{LocalAnalyzer, MonitorState, ReauthMethod, RiskController, StorageService, UserProfile};

#[derive(Parser)]
#[command(author, version, about = "Behavioral anomaly detection for online banking sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    component: Component,
}

#[derive(Subcommand)]
enum Component {
    /// Run the HTTP API server
    ApiServer,

    /// Run a scripted monitoring session against the local scorer
    Simulate,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::logging::init_logger();

    let cli = Cli::parse();

    let config = config::load_config()?;

    match cli.component {
        Component::ApiServer => {
            info!("Starting API server...");
            api::start_api_server(config).await?;
        }
        Component::Simulate => {
            info!("Starting scripted monitoring session...");
            simulate(config).await?;
        }
    }

    Ok(())
}

/// Drives one session end to end: routine activity, an erratic burst
/// that trips the anomaly detector, and the re-authentication flow
/// that clears it.
async fn simulate(config: config::Config) -> Result<()> {
    let storage = Arc::new(StorageService::new());
    let profiles = Arc::new(InMemoryProfileStore::new());
    profiles.upsert_profile("demo-user", UserProfile::demo_baseline());
    let analyzer = Arc::new(LocalAnalyzer::new(profiles.clone(), storage.clone()));

    let controller = RiskController::new(
        "demo-user",
        analyzer,
        storage.clone(),
        storage.clone(),
        config.monitor_config(),
    );

    let session_id = controller.start(json!({ "scenario": "scripted" })).await?;
    info!("Session {} opened", session_id);

    let start = chrono::Utc::now().timestamp_millis() as u64;

    // Routine activity shaped like the stored baseline: steady 1 px/ms
    // pointer drift, even typing cadence
    for i in 0..60u64 {
        controller.record_mouse_move((i * 100) as f64, 50.0, start + i * 100, None);
    }
    for i in 0..15u64 {
        let press = start + i * 250;
        controller.record_key_down("a", press);
        controller.record_key_up("a", press + 100, None);
    }
    controller.run_analysis_once().await;
    info!(
        "After routine activity: state={} risk={:.3} status={}",
        controller.state(),
        controller.risk_score(),
        controller.security_status()
    );

    // Erratic burst: large pointer jumps at uneven intervals, long
    // key holds
    let mut rng = rand::thread_rng();
    let mut t = start + 20_000;
    for _ in 0..80 {
        t += rng.gen_range(5..400);
        controller.record_mouse_move(
            rng.gen_range(0.0..1500.0),
            rng.gen_range(0.0..900.0),
            t,
            None,
        );
    }
    for _ in 0..15 {
        t += rng.gen_range(20..800);
        controller.record_key_down("x", t);
        controller.record_key_up("x", t + rng.gen_range(250..400), None);
    }
    controller.run_analysis_once().await;
    info!(
        "After erratic activity: state={} risk={:.3} status={}",
        controller.state(),
        controller.risk_score(),
        controller.security_status()
    );

    if controller.state() == MonitorState::Critical {
        info!("Anomaly confirmed, walking the re-authentication flow");
        controller.begin_reauth(ReauthMethod::Pin).await?;
        controller.complete_reauth(ReauthMethod::Pin, "123456").await?;
        info!(
            "Re-authentication complete: state={} risk={:.3}",
            controller.state(),
            controller.risk_score()
        );
    }

    controller.stop().await;
    info!("Session closed");

    for event in storage.events_for_user("demo-user", 20).iter().rev() {
        info!(
            "Audit: {} risk={} resolved={}",
            event.event_type,
            event
                .risk_score
                .map(|r| format!("{:.3}", r))
                .unwrap_or_else(|| "-".to_string()),
            event.resolved
        );
    }

    Ok(())
}
