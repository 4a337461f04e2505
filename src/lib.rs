// SecureBank behavioral monitoring
//
// Continuous behavioral-biometric anomaly detection for a banking
// demo: passive interaction capture, statistical feature extraction,
// baseline scoring, and a session risk state machine, plus the HTTP
// surface that serves it.

pub mod api;
pub mod behavioral;
pub mod config;
pub mod db;
pub mod models;
pub mod utils;

pub use behavioral::{
    AnalyzeClient, AnalyzeRequest, AnomalyResult, BehavioralError, EventSampler, FeatureVector,
    MonitorConfig, MonitorState, ReauthMethod, RiskController, SecurityEventSink, SessionBackend,
    UserProfile,
};
pub use db::{LocalAnalyzer, StorageService};
