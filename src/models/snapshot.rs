// Snapshot: the aggregated, chart-ready output of one refresh cycle.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub active_stations: usize,
    pub total_stations: usize,
    /// Rounded mean state of charge, percent.
    pub avg_battery_level: i64,
    /// Rounded mean stored power, watts.
    pub avg_stored_power: i64,
    pub total_users: u64,
    pub chart_window: ChartWindow,
    pub user_distribution: UserDistribution,
}

/// Most recent readings fleet-wide, oldest first. All three series share one length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartWindow {
    pub labels: Vec<String>,
    pub voltage: Vec<f64>,
    pub power: Vec<f64>,
}

impl ChartWindow {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub(crate) fn push(&mut self, label: String, voltage: f64, power: f64) {
        self.labels.push(label);
        self.voltage.push(voltage);
        self.power.push(power);
    }
}

/// Users per station, index-aligned with the latest readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserDistribution {
    pub labels: Vec<String>,
    pub values: Vec<u64>,
}
