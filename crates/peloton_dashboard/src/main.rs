use peloton_client::http_client::ReqwestPelotonClient;
use peloton_client::{Config, Credentials};
use peloton_dashboard::{
    Discipline, LoggingMiddleware, collect_workouts, log_filter, resolve_log_env, to_json,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), anyhow::Error> {
    // Configure logging from env var `PELOTON_LOG_LEVEL` (or fallback to `RUST_LOG`, default `info`).
    let log_env = resolve_log_env(|key| std::env::var(key).ok());
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(log_filter(&log_env))
        .init();
    tracing::debug!(%log_env, "peloton_dashboard: log filter");

    let discipline: Discipline = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PELOTON_DISCIPLINE").ok())
        .map(|d| d.parse::<Discipline>())
        .transpose()?
        .unwrap_or_default();

    let config = Config::from_env()?;
    // Credentials are read before any request is made.
    let credentials = Credentials::from_file(&config.credentials_path)?;

    let client = LoggingMiddleware::new(ReqwestPelotonClient::new(
        &config.base_url,
        config.timeout,
    )?);
    let table = collect_workouts(&client, &config, &credentials, discipline).await?;
    println!("{}", to_json(&table)?);
    Ok(())
}
