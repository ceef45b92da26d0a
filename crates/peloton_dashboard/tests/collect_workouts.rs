use peloton_client::http_client::ReqwestPelotonClient;
use peloton_client::{Config, Credentials, PelotonError};
use peloton_dashboard::{DashboardError, Discipline, LoggingMiddleware, collect_workouts, to_json};
use secrecy::SecretString;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials() -> Credentials {
    Credentials::new("rider", SecretString::new("pw".into()))
}

fn client(server: &MockServer) -> LoggingMiddleware<ReqwestPelotonClient> {
    LoggingMiddleware::new(
        ReqwestPelotonClient::new(&server.uri(), Duration::from_secs(30)).expect("client"),
    )
}

/// Mounts the API. Detail responses echo the workout id unless `echo_ids`
/// is false, in which case every detail reports the same wrong id.
async fn mount_api(server: &MockServer, echo_ids: bool) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user_id": "u1"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total_workouts": 3})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/user/u1/workouts"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"id": "w3", "created": 1_609_700_000, "fitness_discipline": "cycling"},
            {"id": "w2", "created": 1_609_600_000, "fitness_discipline": "yoga"},
            {"id": "w1", "created": 1_609_500_000, "fitness_discipline": "cycling"},
        ]})))
        .mount(server)
        .await;
    for id in ["w1", "w2", "w3"] {
        let reported = if echo_ids { id } else { "ignored" };
        Mock::given(method("GET"))
            .and(path(format!("/api/workout/{id}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": reported, "ride": null})),
            )
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/workout/w\d/performance_graph$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"duration": 600})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn keyed_join_reports_detail_with_wrong_id() {
    // Detail responses carrying a different id cannot be matched to workouts.
    let server = MockServer::start().await;
    mount_api(&server, false).await;
    let config = Config {
        base_url: server.uri(),
        ..Config::default()
    };
    let err = collect_workouts(&client(&server), &config, &credentials(), Discipline::All)
        .await
        .unwrap_err();
    assert!(matches!(err, DashboardError::Api(PelotonError::Schema(_))));
}

#[tokio::test]
async fn filters_by_discipline() {
    let server = MockServer::start().await;
    mount_api(&server, true).await;
    let config = Config {
        base_url: server.uri(),
        ..Config::default()
    };

    let table = collect_workouts(&client(&server), &config, &credentials(), Discipline::Cycling)
        .await
        .expect("table");
    assert_eq!(table.len(), 2);
    // Oldest first.
    assert_eq!(table.cell(0, "id"), Some(&json!("w1")));
    assert_eq!(table.cell(1, "id"), Some(&json!("w3")));
    assert_eq!(table.cell(0, "duration"), Some(&json!(600)));

    let out = to_json(&table).expect("json");
    let parsed: serde_json::Value = serde_json::from_str(&out).expect("parse");
    assert_eq!(parsed.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn login_failure_stops_collection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "invalid credentials"})),
        )
        .mount(&server)
        .await;
    let config = Config {
        base_url: server.uri(),
        ..Config::default()
    };

    let err = collect_workouts(&client(&server), &config, &credentials(), Discipline::All)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DashboardError::Api(PelotonError::Authentication(_))
    ));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
