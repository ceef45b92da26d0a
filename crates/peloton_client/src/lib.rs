//! `PelotonClient` trait, error types and the reqwest-backed workout collector.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod config;
pub mod fetch;
pub mod http_client;
pub mod pipeline;
pub mod table;
pub mod timestamps;

pub use config::{Config, Credentials};
pub use table::Table;

/// A flat JSON object as returned by the API.
pub type Record = Map<String, Value>;

/// Why a single request failed.
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PelotonError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("no authenticated session: {0}")]
    Precondition(String),
    #[error("request to {url} failed: {failure}")]
    Fetch {
        url: String,
        #[source]
        failure: FetchFailure,
    },
    #[error("schema error: {0}")]
    Schema(String),
    #[error("table {table} has {found} rows, expected {expected}")]
    ShapeMismatch {
        table: usize,
        expected: usize,
        found: usize,
    },
}

impl PelotonError {
    pub(crate) fn fetch(url: &str, failure: impl Into<FetchFailure>) -> Self {
        PelotonError::Fetch {
            url: url.to_string(),
            failure: failure.into(),
        }
    }

    /// The URL of the failing request, for `Fetch` errors.
    pub fn url(&self) -> Option<&str> {
        match self {
            PelotonError::Fetch { url, .. } => Some(url),
            _ => None,
        }
    }
}

/// The identity obtained from a successful login.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionIdentity {
    pub user_id: String,
}

#[async_trait]
pub trait PelotonClient: Send + Sync + 'static {
    /// Exchange credentials for a session. Sets the identity used by every
    /// user-scoped call that follows.
    async fn login(&self, credentials: &Credentials) -> Result<SessionIdentity, PelotonError>;

    /// The identity set by [`PelotonClient::login`], or `Precondition` when
    /// no login has succeeded.
    fn session(&self) -> Result<SessionIdentity, PelotonError>;

    /// The authenticated user's profile (`/api/me`).
    async fn get_me(&self) -> Result<Record, PelotonError>;

    /// One page of the user's workouts, newest first.
    async fn get_workouts_page(&self, page: u32, limit: u32) -> Result<Vec<Record>, PelotonError>;

    /// Workout detail with the ride and ride instructor joined in.
    async fn get_workout_detail(&self, workout_id: &str) -> Result<Record, PelotonError>;

    /// Performance graph sampled every `every_n` seconds.
    async fn get_performance_graph(
        &self,
        workout_id: &str,
        every_n: u32,
    ) -> Result<Record, PelotonError>;
}
