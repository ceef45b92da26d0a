//! Errors surfaced by the dashboard binary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("API error: {0}")]
    Api(#[from] peloton_client::PelotonError),

    #[error("{given} is not supported. Supported disciplines include {supported}")]
    UnsupportedDiscipline { given: String, supported: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for dashboard operations.
pub type DashboardResult<T> = Result<T, DashboardError>;
