//! Batch statistics and activity-type filtering

use crate::types::{ActivityRecord, ActivitySummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upstream activity types counted as running
pub const RUNNING_SPORT_TYPES: [&str; 3] = ["Run", "TrailRun", "Treadmill"];

/// Whether an upstream activity type is one of [`RUNNING_SPORT_TYPES`]
pub fn is_running_sport(activity_type: Option<&str>) -> bool {
    activity_type.is_some_and(|t| RUNNING_SPORT_TYPES.contains(&t))
}

/// Scalar fields shared by upstream activities and batch records
pub trait ActivityTotals {
    fn activity_type(&self) -> Option<&str>;
    fn distance_m(&self) -> Option<f64>;
    fn moving_time_s(&self) -> Option<u64>;
    fn elevation_gain_m(&self) -> Option<f64>;
    fn average_heartrate(&self) -> Option<f64>;
    fn start_date(&self) -> Option<DateTime<Utc>>;
}

impl ActivityTotals for ActivitySummary {
    fn activity_type(&self) -> Option<&str> {
        self.activity_type.as_deref()
    }
    fn distance_m(&self) -> Option<f64> {
        self.distance
    }
    fn moving_time_s(&self) -> Option<u64> {
        self.moving_time
    }
    fn elevation_gain_m(&self) -> Option<f64> {
        self.total_elevation_gain
    }
    fn average_heartrate(&self) -> Option<f64> {
        self.average_heartrate
    }
    fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }
}

impl ActivityTotals for ActivityRecord {
    fn activity_type(&self) -> Option<&str> {
        self.activity_type.as_deref()
    }
    fn distance_m(&self) -> Option<f64> {
        self.distance_m
    }
    fn moving_time_s(&self) -> Option<u64> {
        self.moving_time_s
    }
    fn elevation_gain_m(&self) -> Option<f64> {
        self.total_elevation_gain_m
    }
    fn average_heartrate(&self) -> Option<f64> {
        self.average_heartrate_bpm
    }
    fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }
}

/// Keep only running activities, preserving order
pub fn filter_running<T: ActivityTotals + Clone>(items: &[T]) -> Vec<T> {
    items
        .iter()
        .filter(|item| is_running_sport(item.activity_type()))
        .cloned()
        .collect()
}

/// Aggregate statistics over a set of activities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_activities: usize,
    pub total_distance_km: f64,
    pub total_time_hours: f64,
    pub average_distance_km: Option<f64>,
    /// Mean over activities with positive distance and moving time
    pub average_pace_min_per_km: Option<f64>,
    pub total_elevation_gain_m: f64,
    pub average_heartrate: Option<f64>,
    pub first_activity: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl BatchSummary {
    /// Summarize activities or records. Missing fields are left out of sums
    /// and means; averages are `None` when nothing contributes.
    pub fn from_records<T: ActivityTotals>(items: &[T]) -> Self {
        let distances: Vec<f64> = items.iter().filter_map(|a| a.distance_m()).collect();
        let total_distance_m: f64 = distances.iter().sum();
        let total_moving_s: u64 = items.iter().filter_map(|a| a.moving_time_s()).sum();

        let paces: Vec<f64> = items
            .iter()
            .filter_map(|a| {
                let distance_km = a.distance_m()? / 1000.0;
                let moving_min = a.moving_time_s()? as f64 / 60.0;
                (distance_km > 0.0 && moving_min > 0.0).then(|| moving_min / distance_km)
            })
            .collect();

        let heartrates: Vec<f64> = items.iter().filter_map(|a| a.average_heartrate()).collect();
        let dates: Vec<DateTime<Utc>> = items.iter().filter_map(|a| a.start_date()).collect();

        Self {
            total_activities: items.len(),
            total_distance_km: total_distance_m / 1000.0,
            total_time_hours: total_moving_s as f64 / 3600.0,
            average_distance_km: mean(&distances).map(|m| m / 1000.0),
            average_pace_min_per_km: mean(&paces),
            total_elevation_gain_m: items.iter().filter_map(|a| a.elevation_gain_m()).sum(),
            average_heartrate: mean(&heartrates),
            first_activity: dates.iter().min().copied(),
            last_activity: dates.iter().max().copied(),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
