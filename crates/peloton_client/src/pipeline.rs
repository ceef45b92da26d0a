//! Assembly of the combined workout table.
//!
//! The workout list, the per-workout detail (with performance data merged in)
//! and the ride and instructor objects nested in each detail are turned into
//! tables, have their epoch fields converted to the configured zone and are
//! joined on the workout id into one row per workout.

use crate::fetch::{self, MetadataOptions};
use crate::timestamps::{TIME_FIELDS, normalize_timestamps};
use crate::{Config, PelotonClient, PelotonError, Record, Table};
use chrono_tz::Tz;

/// Metadata columns that duplicate what the workout list already carries.
pub const REDUNDANT_COLUMNS: &[&str] = &[
    "created_at",
    "device_type",
    "end_time",
    "fitbit_id",
    "fitness_discipline",
    "has_pedaling_metrics",
    "has_leaderboard_metrics",
    "id",
    "is_total_work_personal_record",
    "metrics_type",
    "name",
    "peloton_id",
    "platform",
    "start_time",
    "strava_id",
    "status",
    "timezone",
    "title",
    "total_work",
    "user_id",
    "workout_type",
    "total_video_watch_time_seconds",
    "total_video_buffering_seconds",
    "v2_total_video_watch_time_seconds",
    "v2_total_video_buffering_seconds",
    "total_music_audio_play_seconds",
    "total_music_audio_buffer_seconds",
    "created",
    "device_time_created_at",
    "effort_zones",
];

const WORKOUT_KEY: &str = "id";

pub struct Pipeline<'a, C: PelotonClient + ?Sized> {
    client: &'a C,
    page_size: u32,
    timezone: Tz,
    metadata: MetadataOptions,
}

impl<'a, C: PelotonClient + ?Sized> Pipeline<'a, C> {
    pub fn new(client: &'a C, config: &Config) -> Self {
        Self {
            client,
            page_size: config.page_size,
            timezone: config.timezone,
            metadata: MetadataOptions {
                every_n: config.performance_every_n,
                concurrency: config.concurrency,
            },
        }
    }

    fn table(&self, records: Vec<Record>) -> Result<Table, PelotonError> {
        let mut table = Table::from_records(records);
        normalize_timestamps(&mut table, TIME_FIELDS, self.timezone)?;
        Ok(table)
    }

    /// The user profile as a one-row table.
    pub async fn user_table(&self) -> Result<Table, PelotonError> {
        let me = self.client.get_me().await?;
        self.table(vec![me])
    }

    /// Every workout of the user, newest first.
    pub async fn workout_records(&self) -> Result<Vec<Record>, PelotonError> {
        fetch::fetch_paged(self.client, self.page_size).await
    }

    pub async fn workouts_table(&self) -> Result<Table, PelotonError> {
        let records = self.workout_records().await?;
        self.table(records)
    }

    /// Detail, performance, ride and instructor columns for `workouts`, keyed
    /// by workout id. Columns the workout list already has are left out.
    pub async fn metadata_table(&self, workouts: &[Record]) -> Result<Table, PelotonError> {
        let ids = fetch::workout_ids(workouts)?;
        let merged = fetch::fetch_metadata(self.client, &ids, self.metadata).await?;
        let mut detail = self.table(merged)?;

        let mut ride = detail.expand_nested("ride")?;
        normalize_timestamps(&mut ride, TIME_FIELDS, self.timezone)?;
        let mut instructor = ride.expand_nested("instructor")?;
        normalize_timestamps(&mut instructor, TIME_FIELDS, self.timezone)?;

        let redundant: Vec<&str> = REDUNDANT_COLUMNS
            .iter()
            .copied()
            .filter(|c| *c != WORKOUT_KEY)
            .chain(["ride"])
            .collect();
        detail.drop_columns(&redundant);
        ride.drop_columns(&["instructor"]);

        // All three come from the same detail records, so rows line up.
        Table::join(
            &[
                detail,
                ride.with_prefix("ride"),
                instructor.with_prefix("instructor"),
            ],
            &[],
        )
    }

    /// One row per workout with its metadata, oldest first.
    pub async fn combined_table(&self) -> Result<Table, PelotonError> {
        let records = self.workout_records().await?;
        let metadata = self.metadata_table(&records).await?;
        let workouts = self.table(records)?;
        let combined = Table::join_on(WORKOUT_KEY, &[workouts, metadata], &[])?;
        tracing::info!(
            rows = combined.len(),
            columns = combined.columns().len(),
            "combined workout table assembled"
        );
        Ok(combined.finalize())
    }
}
