//! Labeled dataset construction.
//!
//! Walks each vehicle's trips in chronological order, maintaining trailing
//! 7/30-day usage windows and a cursor over the vehicle's sorted issues. A
//! trip with a future issue becomes a training row labeled with the distance
//! driven until that issue; a trip with no future issue becomes the vehicle's
//! live feature row.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::{
    days_between, Dataset, IssueEvent, TrainingRow, TripRecord, VehicleRegistry, FEATURE_COUNT,
    MIN_LABEL_KM,
};

/// Trailing window sizes, in days.
const SHORT_WINDOW_DAYS: i64 = 7;
const LONG_WINDOW_DAYS: i64 = 30;

/// Treats a missing or non-finite sensor reading as zero.
fn reading(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// A trailing time window over one vehicle's trips with running aggregates.
///
/// Eviction is relative to the current trip's date, not wall-clock time, so
/// rebuilding over historical data is reproducible.
struct TrailingWindow {
    span: Duration,
    entries: VecDeque<(DateTime<Utc>, f64, f64)>,
    distance_km: f64,
    duration_min: f64,
}

impl TrailingWindow {
    fn new(days: i64) -> Self {
        Self {
            span: Duration::days(days),
            entries: VecDeque::new(),
            distance_km: 0.0,
            duration_min: 0.0,
        }
    }

    /// Evicts entries that fell out of the window relative to `now`, then
    /// admits the trip at `now`.
    fn advance(&mut self, now: DateTime<Utc>, distance_km: f64, duration_min: f64) {
        let cutoff = now - self.span;
        while let Some(&(date, dist, dur)) = self.entries.front() {
            if date >= cutoff {
                break;
            }
            self.distance_km -= dist;
            self.duration_min -= dur;
            self.entries.pop_front();
        }
        self.entries.push_back((now, distance_km, duration_min));
        self.distance_km += distance_km;
        self.duration_min += duration_min;
    }

    fn count(&self) -> usize {
        self.entries.len()
    }
}

/// Assembles the feature vector for one trip. Index-aligned with
/// [`crate::FEATURE_NAMES`].
fn build_trip_features(
    trip: &TripRecord,
    window7: &TrailingWindow,
    window30: &TrailingWindow,
    days_since_issue: f64,
    km_since_issue: f64,
) -> Vec<f64> {
    vec![
        1.0,
        reading(trip.distance_km),
        reading(trip.duration_min),
        reading(trip.avg_speed_kmh),
        window7.count() as f64,
        window30.count() as f64,
        window7.distance_km,
        window30.distance_km,
        window7.duration_min,
        window30.duration_min,
        days_since_issue,
        km_since_issue,
    ]
}

/// Builds the supervised dataset from raw trips and issue history.
///
/// Trips whose display name does not resolve against the registry are
/// silently skipped and counted in [`Dataset::unresolved_trips`]. The output
/// is fully deterministic for identical input.
#[must_use]
pub fn build_dataset(
    trips: &[TripRecord],
    issues: &[IssueEvent],
    registry: &VehicleRegistry,
) -> Dataset {
    let mut issues_by_vehicle: BTreeMap<Uuid, Vec<DateTime<Utc>>> = BTreeMap::new();
    for issue in issues {
        issues_by_vehicle
            .entry(issue.vehicle_id)
            .or_default()
            .push(issue.reported_at);
    }
    for stamps in issues_by_vehicle.values_mut() {
        stamps.sort_unstable();
    }

    let mut unresolved_trips = 0usize;
    let mut trips_by_vehicle: BTreeMap<Uuid, Vec<&TripRecord>> = BTreeMap::new();
    for trip in trips {
        let resolved = trip
            .vehicle_name
            .as_deref()
            .and_then(|name| registry.resolve(name));
        match resolved {
            Some(vehicle_id) => trips_by_vehicle.entry(vehicle_id).or_default().push(trip),
            None => unresolved_trips += 1,
        }
    }

    let mut rows = Vec::new();
    let mut latest_by_vehicle = Vec::new();

    for (vehicle_id, mut vehicle_trips) in trips_by_vehicle {
        vehicle_trips.sort_by_key(|t| t.trip_date);
        let vehicle_issues = issues_by_vehicle
            .get(&vehicle_id)
            .map_or(&[][..], Vec::as_slice);

        let (vehicle_rows, latest) = walk_vehicle(&vehicle_trips, vehicle_issues);
        rows.extend(vehicle_rows);
        if let Some(features) = latest {
            latest_by_vehicle.push((vehicle_id, features));
        }
    }

    debug!(
        rows = rows.len(),
        vehicles_with_latest = latest_by_vehicle.len(),
        unresolved_trips,
        "dataset built"
    );

    Dataset {
        rows,
        latest_by_vehicle,
        unresolved_trips,
    }
}

/// Processes one vehicle's chronologically sorted trips against its sorted
/// issue timestamps.
fn walk_vehicle(
    trips: &[&TripRecord],
    issues: &[DateTime<Utc>],
) -> (Vec<TrainingRow>, Option<Vec<f64>>) {
    // Prefix sums of distance so the span between two trip indices is O(1).
    let mut prefix_km = vec![0.0; trips.len()];
    let mut total = 0.0;
    for (i, trip) in trips.iter().enumerate() {
        total += reading(trip.distance_km);
        prefix_km[i] = total;
    }

    let mut window7 = TrailingWindow::new(SHORT_WINDOW_DAYS);
    let mut window30 = TrailingWindow::new(LONG_WINDOW_DAYS);
    let mut issue_cursor = 0usize;
    let mut last_issue: Option<DateTime<Utc>> = None;
    let mut km_since_issue = 0.0;

    let mut rows = Vec::new();
    let mut latest = None;

    for (i, trip) in trips.iter().enumerate() {
        let current_date = trip.trip_date;
        let distance = reading(trip.distance_km);
        let duration = reading(trip.duration_min);

        window7.advance(current_date, distance, duration);
        window30.advance(current_date, distance, duration);

        // Consume every issue at or before this trip; each consumption
        // restarts the distance-since-issue counter.
        while issue_cursor < issues.len() && issues[issue_cursor] <= current_date {
            last_issue = Some(issues[issue_cursor]);
            km_since_issue = 0.0;
            issue_cursor += 1;
        }

        let days_since_issue = last_issue.map_or(0.0, |at| days_between(at, current_date));
        let features =
            build_trip_features(trip, &window7, &window30, days_since_issue, km_since_issue);
        debug_assert_eq!(features.len(), FEATURE_COUNT);

        match issues.get(issue_cursor) {
            None => {
                // No resolved future outcome: this is the vehicle's live
                // feature row, not a training row.
                latest = Some(features);
            }
            Some(&next_issue) => {
                // Furthest trip index still at or before the next issue; the
                // label is the cumulative distance from this trip (exclusive)
                // through that index.
                let mut furthest = i;
                while furthest + 1 < trips.len() && trips[furthest + 1].trip_date <= next_issue {
                    furthest += 1;
                }
                let label_km = if furthest > i {
                    prefix_km[furthest] - prefix_km[i]
                } else {
                    0.0
                };

                if label_km > MIN_LABEL_KM
                    && label_km.is_finite()
                    && features.iter().all(|v| v.is_finite())
                {
                    rows.push(TrainingRow { features, label_km });
                }
            }
        }

        // Applied after labeling, so a trip's own distance never counts
        // toward its own feature.
        km_since_issue += distance;
    }

    (rows, latest)
}
