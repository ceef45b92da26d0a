//! Paged retrieval of the workout list and per-workout metadata.

use crate::{PelotonClient, PelotonError, Record};
use futures_util::{StreamExt, TryStreamExt, stream};
use serde_json::Value;

/// How many page requests a collection of `total` items needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PagePlan {
    pub full_pages: u32,
    pub remainder: u32,
}

impl PagePlan {
    pub fn new(total: u32, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        Self {
            full_pages: total / page_size,
            remainder: total % page_size,
        }
    }

    /// Page numbers to request, in order.
    pub fn pages(&self) -> std::ops::Range<u32> {
        let extra = u32::from(self.remainder > 0);
        0..self.full_pages + extra
    }

    pub fn request_count(&self) -> u32 {
        self.pages().len() as u32
    }
}

/// `total_workouts` from a user profile.
pub fn total_workouts(profile: &Record) -> Result<u32, PelotonError> {
    let value = profile
        .get("total_workouts")
        .ok_or_else(|| PelotonError::Schema("profile has no total_workouts".into()))?;
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| PelotonError::Schema(format!("total_workouts is not a count: {value}")))
}

/// Fetch every workout of the logged-in user, newest first.
///
/// The user's `total_workouts` decides how many pages are requested; records
/// are concatenated in page order and never re-sorted.
pub async fn fetch_paged<C>(client: &C, page_size: u32) -> Result<Vec<Record>, PelotonError>
where
    C: PelotonClient + ?Sized,
{
    let profile = client.get_me().await?;
    let total = total_workouts(&profile)?;
    let plan = PagePlan::new(total, page_size);
    tracing::debug!(
        total,
        page_size,
        requests = plan.request_count(),
        "paging workouts"
    );

    let mut workouts = Vec::with_capacity(total as usize);
    for page in plan.pages() {
        let data = client.get_workouts_page(page, page_size).await?;
        tracing::debug!(page, records = data.len(), "fetched workout page");
        workouts.extend(data);
    }
    tracing::info!(workouts = workouts.len(), "workout list fetched");
    Ok(workouts)
}

/// The `id` of every workout record, in order.
pub fn workout_ids(workouts: &[Record]) -> Result<Vec<String>, PelotonError> {
    workouts
        .iter()
        .enumerate()
        .map(|(i, w)| match w.get("id") {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(PelotonError::Schema(format!("workout {i} has no id"))),
        })
        .collect()
}

/// Which side keeps its value when both records have the same key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Precedence {
    #[default]
    PrimaryWins,
    SecondaryWins,
}

/// Merge two records key-wise.
///
/// Keys keep the primary record's order, followed by keys only the secondary
/// record has. Collisions are resolved by `precedence`.
pub fn merge_records(primary: Record, secondary: Record, precedence: Precedence) -> Record {
    let mut merged = primary;
    for (key, value) in secondary {
        match merged.get_mut(&key) {
            Some(existing) => {
                if precedence == Precedence::SecondaryWins {
                    *existing = value;
                }
            }
            None => {
                merged.insert(key, value);
            }
        }
    }
    merged
}

/// Settings for [`fetch_metadata`].
#[derive(Clone, Copy, Debug)]
pub struct MetadataOptions {
    /// Sampling interval passed to the performance graph endpoint.
    pub every_n: u32,
    /// Requests kept in flight at once. Output order never depends on it.
    pub concurrency: usize,
}

impl Default for MetadataOptions {
    fn default() -> Self {
        Self {
            every_n: 10_000,
            concurrency: 1,
        }
    }
}

/// Fetch detail and performance data for each workout and merge them, detail
/// first. Returns one record per id, in input order; the first failure aborts
/// the batch.
pub async fn fetch_metadata<C>(
    client: &C,
    workout_ids: &[String],
    options: MetadataOptions,
) -> Result<Vec<Record>, PelotonError>
where
    C: PelotonClient + ?Sized,
{
    let total = workout_ids.len();
    stream::iter(workout_ids.iter().enumerate())
        .map(|(index, id)| async move {
            tracing::trace!(index, total, workout_id = %id, "gathering workout metadata");
            let detail = client.get_workout_detail(id).await?;
            let performance = client.get_performance_graph(id, options.every_n).await?;
            Ok::<_, PelotonError>(merge_records(detail, performance, Precedence::PrimaryWins))
        })
        .buffered(options.concurrency.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> Record {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn page_plan_with_remainder() {
        let plan = PagePlan::new(250, 100);
        assert_eq!(
            plan,
            PagePlan {
                full_pages: 2,
                remainder: 50
            }
        );
        assert_eq!(plan.pages().collect::<Vec<_>>(), [0, 1, 2]);
    }

    #[test]
    fn page_plan_exact_multiple_and_zero() {
        assert_eq!(PagePlan::new(200, 100).request_count(), 2);
        assert_eq!(PagePlan::new(0, 100).request_count(), 0);
        assert_eq!(PagePlan::new(7, 100).pages().collect::<Vec<_>>(), [0]);
    }

    #[test]
    fn page_plan_property() {
        for page_size in [1_u32, 3, 10, 100] {
            for total in 0..50_u32 {
                let plan = PagePlan::new(total, page_size);
                let q = total / page_size;
                let r = total % page_size;
                assert_eq!(plan.request_count(), q + u32::from(r > 0));
            }
        }
    }

    #[test]
    fn total_workouts_must_be_count() {
        assert_eq!(total_workouts(&record(json!({"total_workouts": 12}))).unwrap(), 12);
        assert!(total_workouts(&record(json!({"total_workouts": -1}))).is_err());
        assert!(total_workouts(&record(json!({"username": "x"}))).is_err());
    }

    #[test]
    fn merge_primary_wins_keeps_order() {
        let detail = record(json!({"id": "w1", "title": "detail"}));
        let perf = record(json!({"title": "perf", "duration": 1800}));
        let merged = merge_records(detail, perf, Precedence::PrimaryWins);
        assert_eq!(merged["title"], json!("detail"));
        assert_eq!(merged["duration"], json!(1800));
        let keys: Vec<&String> = merged.keys().collect();
        assert_eq!(keys, ["id", "title", "duration"]);
    }

    #[test]
    fn merge_secondary_wins() {
        let a = record(json!({"title": "a"}));
        let b = record(json!({"title": "b"}));
        let merged = merge_records(a, b, Precedence::SecondaryWins);
        assert_eq!(merged["title"], json!("b"));
    }

    #[test]
    fn workout_ids_require_id() {
        let ws = vec![record(json!({"id": "a"})), record(json!({"id": 7}))];
        assert_eq!(workout_ids(&ws).unwrap(), ["a", "7"]);
        assert!(workout_ids(&[record(json!({"name": "x"}))]).is_err());
    }
}
