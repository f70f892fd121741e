use crate::dependency::DependencyType;
use chrono::{Duration, NaiveDate};

/// Recomputed successor dates: duration is always preserved, so exactly one of
/// start/end is derived from the predecessor and the other follows from it.
pub fn successor_dates(
    kind: DependencyType,
    lag_days: i64,
    predecessor_start: NaiveDate,
    predecessor_end: NaiveDate,
    successor_duration_days: i64,
) -> (NaiveDate, NaiveDate) {
    match kind {
        DependencyType::FinishToStart => {
            // The successor starts the day after the predecessor finishes,
            // then lag is added on top.
            let start = predecessor_end + Duration::days(1 + lag_days);
            (start, start + Duration::days(successor_duration_days))
        }
        DependencyType::StartToStart => {
            let start = predecessor_start + Duration::days(lag_days);
            (start, start + Duration::days(successor_duration_days))
        }
        DependencyType::FinishToFinish => {
            let end = predecessor_end + Duration::days(lag_days);
            (end - Duration::days(successor_duration_days), end)
        }
        DependencyType::StartToFinish => {
            let end = predecessor_start + Duration::days(lag_days);
            (end - Duration::days(successor_duration_days), end)
        }
    }
}
