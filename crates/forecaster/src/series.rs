//! Weekly bucketing of issue events.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

/// Returns the Monday that starts the ISO week containing `date`.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Buckets issue timestamps into the trailing `weeks` completed weeks ending
/// just before the week containing `today`.
///
/// Weeks with no events are present with a zero count, so the series has no
/// gaps; the current in-progress week is excluded so the history never
/// overlaps the forecast horizon.
#[must_use]
pub fn weekly_issue_counts(
    issue_times: &[DateTime<Utc>],
    today: NaiveDate,
    weeks: usize,
) -> Vec<(NaiveDate, u32)> {
    let current_week = week_start(today);
    let start = current_week - Duration::weeks(weeks as i64);

    let mut counts = vec![0u32; weeks];
    for time in issue_times {
        let week = week_start(time.date_naive());
        if week >= start && week < current_week {
            let index = (week.signed_duration_since(start).num_days() / 7) as usize;
            counts[index] += 1;
        }
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(index, count)| (start + Duration::weeks(index as i64), count))
        .collect()
}
