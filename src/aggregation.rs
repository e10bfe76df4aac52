// Pure aggregation: latest + historical readings -> one Snapshot.
// No I/O and no clock; the same inputs always give the same snapshot.

use chrono::{Local, TimeZone};

use crate::error::TelemetryError;
use crate::models::{ChartWindow, Snapshot, StationReading, UserDistribution};

/// Number of readings in the chart window.
pub const CHART_WINDOW_LEN: usize = 12;

/// Chart label format (24h hour:minute).
const LABEL_FORMAT: &str = "%H:%M";

/// Builds a snapshot with chart labels rendered in local time.
pub fn aggregate(
    historical: &[StationReading],
    latest: &[StationReading],
) -> Result<Snapshot, TelemetryError> {
    aggregate_in(historical, latest, &Local)
}

/// Builds a snapshot with chart labels rendered in `tz`.
/// Fails with `EmptyFleet` when `latest` is empty.
pub fn aggregate_in<Tz>(
    historical: &[StationReading],
    latest: &[StationReading],
    tz: &Tz,
) -> Result<Snapshot, TelemetryError>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if latest.is_empty() {
        return Err(TelemetryError::EmptyFleet);
    }

    let total_stations = latest.len();
    let active_stations = latest.iter().filter(|r| r.sunlight).count();
    let avg_battery_level = round_half_up(mean(latest.iter().map(|r| r.battery_level)));
    let avg_stored_power = round_half_up(mean(latest.iter().map(|r| r.stored_power)));
    let total_users = latest.iter().map(|r| r.total_users).sum();

    Ok(Snapshot {
        active_stations,
        total_stations,
        avg_battery_level,
        avg_stored_power,
        total_users,
        chart_window: chart_window(historical, tz),
        user_distribution: user_distribution(latest),
    })
}

/// Fleet-wide window over the most recent readings, regardless of station.
/// Newest first (stable on equal timestamps), truncated, then flipped to oldest first.
pub fn chart_window<Tz>(historical: &[StationReading], tz: &Tz) -> ChartWindow
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut recent: Vec<&StationReading> = historical.iter().collect();
    recent.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
    recent.truncate(CHART_WINDOW_LEN);
    recent.reverse();

    let mut window = ChartWindow::default();
    for r in recent {
        let label = r
            .recorded_at
            .with_timezone(tz)
            .format(LABEL_FORMAT)
            .to_string();
        window.push(label, r.panel_voltage, r.stored_power);
    }
    window
}

pub fn user_distribution(latest: &[StationReading]) -> UserDistribution {
    UserDistribution {
        labels: latest
            .iter()
            .map(|r| format!("Estación {}", r.station_id))
            .collect(),
        values: latest.iter().map(|r| r.total_users).collect(),
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

/// Halves round towards +infinity (2.5 -> 3, -2.5 -> -2).
fn round_half_up(v: f64) -> i64 {
    // `v - floor` is exact; `v + 0.5` is not and rounds 0.49999999999999994 up.
    let floor = v.floor();
    let rounded = if v - floor >= 0.5 { floor + 1.0 } else { floor };
    rounded as i64
}
