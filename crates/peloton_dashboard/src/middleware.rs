//! Logging wrapper around a [`PelotonClient`].
//!
//! Every call is timed and its outcome logged at debug level, so the
//! collection code stays free of logging concerns.

use std::sync::Arc;
use std::time::Instant;

use peloton_client::{Credentials, PelotonClient, PelotonError, Record, SessionIdentity};
use tracing::debug;

#[derive(Clone)]
pub struct LoggingMiddleware<C: PelotonClient> {
    inner: Arc<C>,
}

impl<C: PelotonClient> LoggingMiddleware<C> {
    pub fn new(client: C) -> Self {
        Self {
            inner: Arc::new(client),
        }
    }

    /// Execute a fallible operation with logging.
    async fn with_logging<F, Fut, T>(&self, operation: F, name: &str) -> Result<T, PelotonError>
    where
        F: FnOnce(Arc<C>) -> Fut,
        Fut: std::future::Future<Output = Result<T, PelotonError>>,
    {
        let start = Instant::now();
        debug!("Starting operation: {}", name);

        let result = operation(self.inner.clone()).await;

        let duration = start.elapsed();
        match &result {
            Ok(_) => debug!("Operation completed: {} in {:?}", name, duration),
            Err(e) => debug!("Operation failed: {} in {:?} - error: {}", name, duration, e),
        }
        result
    }
}

#[async_trait::async_trait]
impl<C: PelotonClient + 'static> PelotonClient for LoggingMiddleware<C> {
    async fn login(&self, credentials: &Credentials) -> Result<SessionIdentity, PelotonError> {
        self.with_logging(
            |client| async move { client.login(credentials).await },
            "login",
        )
        .await
    }

    fn session(&self) -> Result<SessionIdentity, PelotonError> {
        self.inner.session()
    }

    async fn get_me(&self) -> Result<Record, PelotonError> {
        self.with_logging(|client| async move { client.get_me().await }, "get_me")
            .await
    }

    async fn get_workouts_page(&self, page: u32, limit: u32) -> Result<Vec<Record>, PelotonError> {
        self.with_logging(
            |client| async move { client.get_workouts_page(page, limit).await },
            &format!("get_workouts_page(page={page})"),
        )
        .await
    }

    async fn get_workout_detail(&self, workout_id: &str) -> Result<Record, PelotonError> {
        self.with_logging(
            |client| async move { client.get_workout_detail(workout_id).await },
            "get_workout_detail",
        )
        .await
    }

    async fn get_performance_graph(
        &self,
        workout_id: &str,
        every_n: u32,
    ) -> Result<Record, PelotonError> {
        self.with_logging(
            |client| async move { client.get_performance_graph(workout_id, every_n).await },
            "get_performance_graph",
        )
        .await
    }
}
