//! Dataset builder crate for the fleet maintenance model.
//!
//! This crate transforms raw trip telemetry and reported-issue history into
//! ML-ready feature vectors with a censored, event-driven regression label:
//! the distance a vehicle travelled until its next reported issue.

use chrono::{DateTime, Utc};
use uuid::Uuid;

mod builder;
mod registry;

pub use builder::build_dataset;
pub use registry::{normalize_name, VehicleRegistry};

/// The number of features in each vector.
/// This includes:
/// - A constant bias term (1)
/// - Current trip distance, duration and average speed (3)
/// - Trailing 7-day and 30-day window trip counts (2)
/// - Trailing 7-day and 30-day summed distance (2)
/// - Trailing 7-day and 30-day summed duration (2)
/// - Days since the last reported issue (1)
/// - Distance accumulated since the last reported issue (1)
pub const FEATURE_COUNT: usize = 12;

/// Feature names, index-aligned with the vectors produced by
/// [`build_dataset`]. Stored in the model artifact so inference can verify
/// arity.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "bias",
    "distance_km",
    "duration_min",
    "avg_speed_kmh",
    "trips_last_7d",
    "trips_last_30d",
    "distance_last_7d_km",
    "distance_last_30d_km",
    "duration_last_7d_min",
    "duration_last_30d_min",
    "days_since_last_issue",
    "km_since_last_issue",
];

/// Labels at or below this threshold are degenerate (the issue arrived before
/// the vehicle moved again) and are excluded from training.
pub const MIN_LABEL_KM: f64 = 1e-6;

/// A raw trip telemetry record.
///
/// Produced by the external analytics collaborator; only rows with a
/// resolvable vehicle name participate in dataset construction. Missing
/// distance/duration/speed readings are treated as zero in features.
#[derive(Debug, Clone, PartialEq)]
pub struct TripRecord {
    pub vehicle_name: Option<String>,
    pub trip_date: DateTime<Utc>,
    pub distance_km: Option<f64>,
    pub duration_min: Option<f64>,
    pub avg_speed_kmh: Option<f64>,
}

/// A reported maintenance/safety issue event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IssueEvent {
    pub vehicle_id: Uuid,
    pub reported_at: DateTime<Utc>,
}

/// A single labeled training row.
///
/// The label is the cumulative distance (km) from this trip, exclusive,
/// through the furthest trip that still precedes the vehicle's next issue.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub features: Vec<f64>,
    pub label_km: f64,
}

/// Output of a dataset build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    /// Labeled training rows across all vehicles.
    pub rows: Vec<TrainingRow>,
    /// The most recent unlabeled feature row per vehicle, used for live
    /// prediction. A vehicle appears here only if it has at least one trip
    /// with no reported issue after it. Sorted by vehicle id.
    pub latest_by_vehicle: Vec<(Uuid, Vec<f64>)>,
    /// Trips whose display name did not resolve against the registry.
    /// Non-fatal; tracked for reporting.
    pub unresolved_trips: usize,
}

impl Dataset {
    /// Returns the number of labeled rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no labeled rows were produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Whole days between two timestamps, rounded, floored at zero.
#[must_use]
pub(crate) fn days_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    let days = (b - a).num_seconds() as f64 / 86_400.0;
    days.round().max(0.0)
}
