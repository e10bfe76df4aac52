// Aggregation tests: fleet statistics, chart window, user distribution

mod common;

use chrono::{FixedOffset, Utc};
use common::*;
use solarwatch::aggregation::{CHART_WINDOW_LEN, aggregate, aggregate_in, chart_window};
use solarwatch::error::TelemetryError;
use solarwatch::models::*;

#[test]
fn fleet_stats_two_stations() {
    let latest = vec![
        station(1, true, 80.0, 100.0, 3),
        station(2, false, 60.0, 50.0, 5),
    ];
    let snap = aggregate_in(&[], &latest, &Utc).unwrap();
    assert_eq!(snap.active_stations, 1);
    assert_eq!(snap.total_stations, 2);
    assert_eq!(snap.avg_battery_level, 70);
    assert_eq!(snap.avg_stored_power, 75);
    assert_eq!(snap.total_users, 8);
}

#[test]
fn active_never_exceeds_total() {
    let latest: Vec<StationReading> = (0..7)
        .map(|i| station(i, i % 3 == 0, 50.0, 20.0, 1))
        .collect();
    let snap = aggregate_in(&[], &latest, &Utc).unwrap();
    assert_eq!(snap.total_stations, 7);
    assert_eq!(snap.active_stations, 3);
    assert!(snap.active_stations <= snap.total_stations);
}

#[test]
fn averages_round_half_up() {
    let latest = vec![
        station(1, true, 50.0, 10.0, 0),
        station(2, true, 51.0, 11.0, 0),
    ];
    let snap = aggregate_in(&[], &latest, &Utc).unwrap();
    assert_eq!(snap.avg_battery_level, 51); // 50.5
    assert_eq!(snap.avg_stored_power, 11); // 10.5

    let latest = vec![
        station(1, true, 10.0, 10.0, 0),
        station(2, true, 10.0, 10.0, 0),
        station(3, true, 11.0, 10.0, 0),
    ];
    let snap = aggregate_in(&[], &latest, &Utc).unwrap();
    assert_eq!(snap.avg_battery_level, 10); // 10.33
}

#[test]
fn empty_latest_is_empty_fleet() {
    let history = vec![reading_at(1, 0)];
    let err = aggregate_in(&history, &[], &Utc).unwrap_err();
    assert!(matches!(err, TelemetryError::EmptyFleet));
}

#[test]
fn chart_window_keeps_last_twelve_ascending() {
    // 15 distinct minutes, deliberately out of order
    let order = [7, 0, 14, 3, 11, 1, 9, 13, 2, 5, 12, 4, 10, 8, 6];
    let history: Vec<StationReading> = order.iter().map(|m| reading_at(1, *m)).collect();
    let snap = aggregate_in(&history, &[station(1, true, 50.0, 50.0, 1)], &Utc).unwrap();

    let window = &snap.chart_window;
    assert_eq!(window.len(), CHART_WINDOW_LEN);
    assert_eq!(window.voltage.len(), window.labels.len());
    assert_eq!(window.power.len(), window.labels.len());
    assert_eq!(window.labels.first().map(String::as_str), Some("10:03"));
    assert_eq!(window.labels.last().map(String::as_str), Some("10:14"));
    let expected_voltage: Vec<f64> = (3..15).map(|m| m as f64).collect();
    assert_eq!(window.voltage, expected_voltage);
    let expected_power: Vec<f64> = (3..15).map(|m| 10.0 * m as f64).collect();
    assert_eq!(window.power, expected_power);
}

#[test]
fn chart_window_shorter_history_is_kept_whole() {
    let history = vec![reading_at(2, 5), reading_at(1, 1), reading_at(3, 3)];
    let window = chart_window(&history, &Utc);
    assert_eq!(window.labels, vec!["10:01", "10:03", "10:05"]);
    assert_eq!(window.voltage, vec![1.0, 3.0, 5.0]);
}

#[test]
fn chart_window_mixes_stations() {
    let history: Vec<StationReading> = (0..4).map(|m| reading_at(m as i64 + 1, m)).collect();
    let window = chart_window(&history, &Utc);
    assert_eq!(window.len(), 4);
    assert_eq!(window.voltage, vec![0.0, 1.0, 2.0, 3.0]);
}

#[test]
fn chart_window_equal_timestamps_sorted_stably_before_reversal() {
    let mut a = reading_at(1, 0);
    a.panel_voltage = 1.0;
    let mut b = reading_at(2, 0);
    b.panel_voltage = 2.0;
    let mut c = reading_at(3, 1);
    c.panel_voltage = 3.0;
    // newest first: c, a, b (a before b kept) -> reversed: b, a, c
    let window = chart_window(&[a, b, c], &Utc);
    assert_eq!(window.voltage, vec![2.0, 1.0, 3.0]);
}

#[test]
fn chart_window_duplicates_are_not_collapsed() {
    let history = vec![reading_at(1, 4), reading_at(1, 4)];
    let window = chart_window(&history, &Utc);
    assert_eq!(window.labels, vec!["10:04", "10:04"]);
}

#[test]
fn chart_labels_follow_time_zone() {
    let history = vec![reading_at(1, 3)];
    let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
    let window = chart_window(&history, &plus_two);
    assert_eq!(window.labels, vec!["12:03"]);
}

#[test]
fn empty_history_gives_empty_window() {
    let snap = aggregate_in(&[], &[station(1, false, 0.0, 0.0, 0)], &Utc).unwrap();
    assert!(snap.chart_window.is_empty());
    assert_eq!(snap.active_stations, 0);
}

#[test]
fn user_distribution_follows_latest_order() {
    let mut named = station(9, true, 40.0, 40.0, 12);
    named.station_id = StationId::Text("norte-3".into());
    let latest = vec![station(2, true, 40.0, 40.0, 7), named, station(1, false, 40.0, 40.0, 0)];
    let snap = aggregate_in(&[], &latest, &Utc).unwrap();
    assert_eq!(
        snap.user_distribution.labels,
        vec!["Estación 2", "Estación norte-3", "Estación 1"]
    );
    assert_eq!(snap.user_distribution.values, vec![7, 12, 0]);
}

#[test]
fn aggregate_is_idempotent() {
    let history: Vec<StationReading> = (0..20).map(|m| reading_at(1, m)).collect();
    let latest = vec![
        station(1, true, 80.0, 100.0, 3),
        station(2, false, 60.0, 50.0, 5),
    ];
    let first = aggregate(&history, &latest).unwrap();
    let second = aggregate(&history, &latest).unwrap();
    assert_eq!(first, second);
}

#[test]
fn aggregate_from_wire_readings() {
    let latest = parse_readings(fleet_latest(), "latest");
    let history = parse_readings(fleet_history(), "historical");
    let snap = aggregate_in(&history, &latest, &Utc).unwrap();
    assert_eq!(snap.total_stations, 2);
    assert_eq!(snap.avg_battery_level, 70);
    assert_eq!(snap.avg_stored_power, 75);
    assert_eq!(snap.total_users, 8);
    assert_eq!(snap.chart_window.len(), 12);
    assert_eq!(snap.chart_window.labels[0], "10:03");
}
