// src/behavioral/mod.rs
pub mod controller;
pub mod features;
pub mod profile;
pub mod sampler;
pub mod scorer;

use thiserror::Error;

pub use controller::{
    AnalyzeClient, AnalyzeRequest, MonitorConfig, MonitorState, ReauthMethod, RiskController,
    SecurityEventSink, SessionBackend,
};
pub use features::{BehavioralFeatures, FeatureVector};
pub use profile::{InMemoryProfileStore, ProfileStore, UserProfile};
pub use sampler::EventSampler;
pub use scorer::{AnomalyDetails, AnomalyResult};

#[derive(Debug, Error)]
pub enum BehavioralError {
    #[error("Invalid feature vector: expected {expected} dimensions, got {actual}")]
    InvalidFeatureVector { expected: usize, actual: usize },
    #[error("Invalid re-authentication input: {0}")]
    InvalidReauthInput(String),
    #[error("Monitoring is not in the required state: {0}")]
    InvalidState(String),
    #[error("Session not found: {0}")]
    SessionNotFound(uuid::Uuid),
    #[error("Scoring backend failure: {0}")]
    ScoringFailure(String),
    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

pub type Result<T> = std::result::Result<T, BehavioralError>;
