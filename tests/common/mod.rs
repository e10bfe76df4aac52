// Shared test helpers: reading builders and an in-memory telemetry source

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use solarwatch::error::TelemetryError;
use solarwatch::models::*;
use solarwatch::source::TelemetrySource;

pub fn raw(
    id: i64,
    ts: &str,
    sunlight: bool,
    battery: &str,
    power: &str,
    voltage: &str,
    users: &str,
) -> RawStationReading {
    RawStationReading {
        id_estacion: Some(serde_json::json!(id)),
        fecha_registro: Some(serde_json::json!(ts)),
        luz_solar: serde_json::Value::Bool(sunlight),
        estado_carga: Some(FieldValue::Text(battery.to_string())),
        potencia_almacenada: Some(FieldValue::Text(power.to_string())),
        voltaje_panel: Some(FieldValue::Text(voltage.to_string())),
        usuarios_totales: Some(FieldValue::Text(users.to_string())),
    }
}

pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

pub fn station(id: i64, sunlight: bool, battery: f64, power: f64, users: u64) -> StationReading {
    StationReading {
        station_id: StationId::Number(id),
        recorded_at: ts("2024-05-01T12:00:00Z"),
        sunlight,
        battery_level: battery,
        stored_power: power,
        panel_voltage: 12.0,
        total_users: users,
    }
}

/// Historical reading at `minute` past 10:00 UTC, voltage = minute, power = 10 * minute.
pub fn reading_at(id: i64, minute: u32) -> StationReading {
    StationReading {
        station_id: StationId::Number(id),
        recorded_at: ts(&format!("2024-05-01T10:{:02}:00Z", minute)),
        sunlight: true,
        battery_level: 50.0,
        stored_power: 10.0 * minute as f64,
        panel_voltage: minute as f64,
        total_users: 1,
    }
}

/// Two stations: one in sunlight, batteries 80/60, power 100/50, users 3/5.
pub fn fleet_latest() -> Vec<RawStationReading> {
    vec![
        raw(1, "2024-05-01T10:05:00Z", true, "80", "100", "12.5", "3"),
        raw(2, "2024-05-01T10:06:00Z", false, "60", "50", "11.0", "5"),
    ]
}

pub fn fleet_history() -> Vec<RawStationReading> {
    (0..15)
        .map(|m| {
            raw(
                (m % 2) as i64 + 1,
                &format!("2024-05-01T10:{:02}:00Z", m),
                true,
                "70",
                &format!("{}", m * 10),
                &format!("{}", 12 + m),
                "4",
            )
        })
        .collect()
}

#[derive(Clone)]
pub enum Reply {
    Readings(Vec<RawStationReading>),
    Status(u16),
}

impl Reply {
    fn into_result(self, endpoint: &str) -> Result<Vec<RawStationReading>, TelemetryError> {
        match self {
            Reply::Readings(v) => Ok(v),
            Reply::Status(status) => Err(TelemetryError::Status {
                endpoint: endpoint.to_string(),
                status,
            }),
        }
    }
}

/// In-memory `TelemetrySource`. History fetch `n` sleeps `history_delays[n]` (zero when absent).
pub struct FakeSource {
    history: Mutex<Reply>,
    latest: Mutex<Reply>,
    history_delays: Vec<Duration>,
    pub history_calls: AtomicUsize,
    pub latest_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(history: Reply, latest: Reply) -> Self {
        Self {
            history: Mutex::new(history),
            latest: Mutex::new(latest),
            history_delays: Vec::new(),
            history_calls: AtomicUsize::new(0),
            latest_calls: AtomicUsize::new(0),
        }
    }

    pub fn healthy() -> Self {
        Self::new(
            Reply::Readings(fleet_history()),
            Reply::Readings(fleet_latest()),
        )
    }

    pub fn with_history_delays(mut self, delays: Vec<Duration>) -> Self {
        self.history_delays = delays;
        self
    }

    pub fn set_history(&self, reply: Reply) {
        *self.history.lock().unwrap() = reply;
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn latest_calls(&self) -> usize {
        self.latest_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetrySource for FakeSource {
    async fn fetch_history(&self) -> Result<Vec<RawStationReading>, TelemetryError> {
        let n = self.history_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.history_delays.get(n) {
            tokio::time::sleep(*delay).await;
        }
        let reply = self.history.lock().unwrap().clone();
        reply.into_result("/datos")
    }

    async fn fetch_latest(&self) -> Result<Vec<RawStationReading>, TelemetryError> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.latest.lock().unwrap().clone();
        reply.into_result("/ultimas-lecturas")
    }

    async fn fetch_station(&self, station_id: &str) -> Result<serde_json::Value, TelemetryError> {
        if matches!(station_id.trim(), "" | "." | "..") {
            return Err(TelemetryError::InvalidStationId(station_id.to_string()));
        }
        if station_id == "404" {
            return Err(TelemetryError::Status {
                endpoint: format!("/datos/{}", station_id),
                status: 404,
            });
        }
        Ok(serde_json::json!({ "id_estacion": station_id, "luz_solar": true }))
    }
}
