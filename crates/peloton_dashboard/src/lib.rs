//! Collects a user's workouts into one table and exports it as JSON.

use std::fmt;
use std::str::FromStr;

use peloton_client::pipeline::Pipeline;
use peloton_client::{Config, Credentials, PelotonClient, PelotonError, Table};
use serde_json::Value;

pub mod error;
pub mod middleware;

pub use error::{DashboardError, DashboardResult};
pub use middleware::LoggingMiddleware;

/// Default log filter when neither `PELOTON_LOG_LEVEL` nor `RUST_LOG` is set.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// The log filter requested through `get`: `PELOTON_LOG_LEVEL`, then
/// `RUST_LOG`, then [`DEFAULT_LOG_FILTER`].
pub fn resolve_log_env<F>(get: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    get("PELOTON_LOG_LEVEL")
        .or_else(|| get("RUST_LOG"))
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

/// Build the log filter, keeping HTTP internals quiet unless asked for.
pub fn log_filter(log_env: &str) -> tracing_subscriber::EnvFilter {
    let combined = format!("{log_env},hyper=warn,reqwest=warn");
    tracing_subscriber::EnvFilter::try_new(combined)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Workout disciplines the table can be narrowed to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Discipline {
    #[default]
    All,
    BikeBootcamp,
    Cardio,
    Cycling,
    Meditation,
    Running,
    Strength,
    Stretching,
    Walking,
    Yoga,
}

impl Discipline {
    pub const SUPPORTED: &'static [Discipline] = &[
        Discipline::All,
        Discipline::BikeBootcamp,
        Discipline::Cardio,
        Discipline::Cycling,
        Discipline::Meditation,
        Discipline::Running,
        Discipline::Strength,
        Discipline::Stretching,
        Discipline::Walking,
        Discipline::Yoga,
    ];

    /// The API's `fitness_discipline` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Discipline::All => "all",
            Discipline::BikeBootcamp => "bike_bootcamp",
            Discipline::Cardio => "cardio",
            Discipline::Cycling => "cycling",
            Discipline::Meditation => "meditation",
            Discipline::Running => "running",
            Discipline::Strength => "strength",
            Discipline::Stretching => "stretching",
            Discipline::Walking => "walking",
            Discipline::Yoga => "yoga",
        }
    }

    /// Keep only the rows of this discipline; `All` keeps every row.
    pub fn filter(&self, table: &Table) -> Table {
        match self {
            Discipline::All => table.clone(),
            other => table.filter_eq("fitness_discipline", &Value::from(other.as_str())),
        }
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Discipline {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::SUPPORTED
            .iter()
            .copied()
            .find(|d| d.as_str() == wanted)
            .ok_or_else(|| DashboardError::UnsupportedDiscipline {
                given: s.to_string(),
                supported: Self::SUPPORTED
                    .iter()
                    .map(Discipline::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Log in, collect the combined workout table and narrow it to `discipline`.
///
/// A failed login is logged as "Login failed" and returned without any
/// further request being made.
pub async fn collect_workouts<C>(
    client: &C,
    config: &Config,
    credentials: &Credentials,
    discipline: Discipline,
) -> DashboardResult<Table>
where
    C: PelotonClient + ?Sized,
{
    match client.login(credentials).await {
        Ok(identity) => tracing::info!(user_id = %identity.user_id, "Login successful"),
        Err(e @ PelotonError::Authentication(_)) => {
            tracing::error!(error = %e, "Login failed");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    }

    let table = Pipeline::new(client, config).combined_table().await?;
    let table = discipline.filter(&table);
    tracing::info!(%discipline, rows = table.len(), "workout table ready");
    Ok(table)
}

/// Render a table as a JSON array of row objects.
pub fn to_json(table: &Table) -> DashboardResult<String> {
    let rows: Vec<Value> = table.to_records().into_iter().map(Value::Object).collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn discipline_parses_supported_names() {
        assert_eq!("cycling".parse::<Discipline>().unwrap(), Discipline::Cycling);
        assert_eq!(
            "Bike_Bootcamp".parse::<Discipline>().unwrap(),
            Discipline::BikeBootcamp
        );
        assert_eq!("all".parse::<Discipline>().unwrap(), Discipline::All);
    }

    #[test]
    fn discipline_rejects_unknown_and_lists_supported() {
        let err = "rowing".parse::<Discipline>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("rowing is not supported"));
        assert!(msg.contains("bike_bootcamp"));
        assert!(msg.contains("yoga"));
    }

    #[test]
    fn discipline_filter() {
        let records = [
            json!({"id": "a", "fitness_discipline": "cycling"}),
            json!({"id": "b", "fitness_discipline": "yoga"}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap());
        let table = Table::from_records(records);
        assert_eq!(Discipline::All.filter(&table).len(), 2);
        let yoga = Discipline::Yoga.filter(&table);
        assert_eq!(yoga.len(), 1);
        assert_eq!(yoga.cell(0, "id"), Some(&json!("b")));
    }

    #[test]
    fn json_export_keeps_column_order() {
        let table = Table::from_records([json!({"z": 1, "a": null})
            .as_object()
            .cloned()
            .unwrap()]);
        let out = to_json(&table).unwrap();
        assert!(out.find("\"z\"").unwrap() < out.find("\"a\"").unwrap());
    }

    #[test]
    fn invalid_log_filter_falls_back() {
        let filter = log_filter("peloton_client=loud").to_string();
        assert!(filter.contains(DEFAULT_LOG_FILTER));
        assert!(!filter.contains("peloton_client"));
        assert!(!filter.contains("hyper=warn"));
    }
}
