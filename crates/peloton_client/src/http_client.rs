//! HTTP client implementation for the Peloton API.
//!
//! This module provides a reqwest-based implementation of the [`PelotonClient`](crate::PelotonClient) trait.
//! Authentication is cookie based: the login response sets a session cookie
//! which the shared cookie store replays on every later request.

use crate::{Credentials, FetchFailure, PelotonClient, PelotonError, Record, SessionIdentity};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;

const USER_AGENT_VALUE: &str = "peloton_dashboard";

/// Client for the Peloton API using reqwest.
#[derive(Debug)]
pub struct ReqwestPelotonClient {
    base_url: String,
    client: reqwest::Client,
    identity: RwLock<Option<SessionIdentity>>,
}

impl ReqwestPelotonClient {
    /// Create a new client instance.
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the Peloton API (e.g., "https://api.onepeloton.com")
    /// * `timeout` - Applied to every request, including login
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PelotonError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| PelotonError::Config(format!("building http client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            identity: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn user_id(&self) -> Result<String, PelotonError> {
        self.session().map(|s| s.user_id)
    }

    /// GET `url` with the query pairs `qp` and decode the body as JSON.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        qp: &[(&str, &str)],
        endpoint: &'static str,
    ) -> Result<T, PelotonError> {
        metrics::counter!("peloton_requests_total", "endpoint" => endpoint).increment(1);
        let result = self.fetch_json(url, qp).await;
        if result.is_err() {
            metrics::counter!("peloton_request_failures_total", "endpoint" => endpoint)
                .increment(1);
        }
        result
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        qp: &[(&str, &str)],
    ) -> Result<T, PelotonError> {
        let request = self
            .client
            .get(url)
            .query(qp)
            .build()
            .map_err(|e| PelotonError::fetch(url, e))?;
        let url = request.url().to_string();
        tracing::debug!(%url, "GET");
        let resp = self
            .client
            .execute(request)
            .await
            .map_err(|e| PelotonError::fetch(&url, e))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| PelotonError::fetch(&url, e))?;
        if !status.is_success() {
            return Err(PelotonError::fetch(
                &url,
                FetchFailure::Status {
                    status: status.as_u16(),
                    body: snippet(&text),
                },
            ));
        }
        serde_json::from_str(&text).map_err(|e| PelotonError::fetch(&url, e))
    }

    /// POST the credentials and read the session identity from the reply.
    async fn post_login(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> Result<SessionIdentity, PelotonError> {
        let payload = serde_json::json!({
            "username_or_email": credentials.username,
            "password": credentials.password.expose_secret(),
        });
        let resp = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PelotonError::fetch(url, e))?;
        let text = resp.text().await.map_err(|e| PelotonError::fetch(url, e))?;

        // Any body without a usable user_id is a failed login, whatever the status.
        serde_json::from_str::<Value>(&text)
            .ok()
            .as_ref()
            .and_then(extract_user_id)
            .map(|user_id| SessionIdentity { user_id })
            .ok_or_else(|| PelotonError::Authentication(snippet(&text)))
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(256).collect()
}

/// The `user_id` of a login response, accepting strings or numbers.
fn extract_user_id(body: &Value) -> Option<String> {
    match body.get("user_id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl PelotonClient for ReqwestPelotonClient {
    async fn login(&self, credentials: &Credentials) -> Result<SessionIdentity, PelotonError> {
        let url = format!("{}/auth/login", self.base_url);
        metrics::counter!("peloton_requests_total", "endpoint" => "login").increment(1);
        let identity = self.post_login(&url, credentials).await.inspect_err(|_| {
            metrics::counter!("peloton_request_failures_total", "endpoint" => "login")
                .increment(1);
        })?;

        let mut slot = self
            .identity
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(identity.clone());
        tracing::info!(user_id = %identity.user_id, "login successful");
        Ok(identity)
    }

    fn session(&self) -> Result<SessionIdentity, PelotonError> {
        self.identity
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or_else(|| PelotonError::Precondition("login has not succeeded".into()))
    }

    async fn get_me(&self) -> Result<Record, PelotonError> {
        self.session()?;
        let url = format!("{}/api/me", self.base_url);
        self.get_json(&url, &[], "me").await
    }

    async fn get_workouts_page(&self, page: u32, limit: u32) -> Result<Vec<Record>, PelotonError> {
        let url = format!("{}/api/user/{}/workouts", self.base_url, self.user_id()?);
        let page = page.to_string();
        let limit = limit.to_string();
        let qp = [
            ("sort_by", "-created"),
            ("page", page.as_str()),
            ("limit", limit.as_str()),
        ];

        #[derive(serde::Deserialize)]
        struct WorkoutPage {
            data: Option<Vec<Record>>,
        }

        let body: WorkoutPage = self.get_json(&url, &qp, "workouts").await?;
        body.data.ok_or_else(|| {
            PelotonError::Schema(format!("{url} page {page}: response has no data array"))
        })
    }

    async fn get_workout_detail(&self, workout_id: &str) -> Result<Record, PelotonError> {
        self.session()?;
        let url = format!("{}/api/workout/{}", self.base_url, workout_id);
        self.get_json(&url, &[("joins", "ride,ride.instructor")], "workout")
            .await
    }

    async fn get_performance_graph(
        &self,
        workout_id: &str,
        every_n: u32,
    ) -> Result<Record, PelotonError> {
        self.session()?;
        let url = format!("{}/api/workout/{}/performance_graph", self.base_url, workout_id);
        let every_n = every_n.to_string();
        self.get_json(&url, &[("every_n", every_n.as_str())], "performance_graph")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_id_accepts_string_and_number() {
        assert_eq!(
            extract_user_id(&json!({"user_id": "abc"})).as_deref(),
            Some("abc")
        );
        assert_eq!(
            extract_user_id(&json!({"user_id": 42})).as_deref(),
            Some("42")
        );
    }

    #[test]
    fn user_id_missing_or_invalid() {
        assert!(extract_user_id(&json!({"error": "invalid credentials"})).is_none());
        assert!(extract_user_id(&json!({"user_id": null})).is_none());
        assert!(extract_user_id(&json!({"user_id": ""})).is_none());
    }

    #[tokio::test]
    async fn user_scoped_calls_fail_before_login() {
        let client =
            ReqwestPelotonClient::new("http://localhost/", Duration::from_secs(1)).expect("client");
        assert_eq!(client.base_url(), "http://localhost");
        assert!(matches!(client.session(), Err(PelotonError::Precondition(_))));
        assert!(matches!(
            client.get_workouts_page(0, 100).await,
            Err(PelotonError::Precondition(_))
        ));
        assert!(matches!(
            client.get_me().await,
            Err(PelotonError::Precondition(_))
        ));
    }
}
