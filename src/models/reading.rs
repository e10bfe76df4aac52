// Station readings: wire shape as served by the telemetry API, and the parsed form
// the aggregation works on. Parsing happens once, at the boundary.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;

/// Station identifier; the API has served both integers and strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StationId {
    Number(i64),
    Text(String),
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationId::Number(n) => write!(f, "{}", n),
            StationId::Text(s) => f.write_str(s),
        }
    }
}

/// Numeric field as sent upstream: normally a decimal string, occasionally a JSON number.
/// Any other JSON type lands in `Other` and fails to parse later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl FieldValue {
    /// Finite decimal value, or None.
    pub fn as_decimal(&self) -> Option<f64> {
        let v = match self {
            FieldValue::Number(n) => *n,
            FieldValue::Text(s) => s.trim().parse::<f64>().ok()?,
            FieldValue::Other(_) => return None,
        };
        v.is_finite().then_some(v)
    }

    /// Non-negative base-10 integer, or None. "3.5" and "12abc" are rejected.
    pub fn as_count(&self) -> Option<u64> {
        match self {
            FieldValue::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= u64::MAX as f64 => {
                Some(*n as u64)
            }
            FieldValue::Text(s) => s.trim().parse::<u64>().ok(),
            FieldValue::Number(_) | FieldValue::Other(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Other(v) => write!(f, "{}", v),
        }
    }
}

/// One reading exactly as the API returns it. Every field accepts any JSON value
/// (missing or null is `None`), so a wrong-typed field is caught by `parse()` and
/// only its own entry is rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawStationReading {
    #[serde(default)]
    pub id_estacion: Option<serde_json::Value>,
    #[serde(default)]
    pub fecha_registro: Option<serde_json::Value>,
    /// Only JSON `true` counts as sunlight; anything else is inactive.
    #[serde(default)]
    pub luz_solar: serde_json::Value,
    #[serde(default)]
    pub estado_carga: Option<FieldValue>,
    #[serde(default)]
    pub potencia_almacenada: Option<FieldValue>,
    #[serde(default)]
    pub voltaje_panel: Option<FieldValue>,
    #[serde(default)]
    pub usuarios_totales: Option<FieldValue>,
}

/// Typed reading. Every numeric field is finite.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationReading {
    pub station_id: StationId,
    pub recorded_at: DateTime<Utc>,
    pub sunlight: bool,
    /// State of charge, percent.
    pub battery_level: f64,
    /// Stored power, watts.
    pub stored_power: f64,
    /// Panel voltage, volts.
    pub panel_voltage: f64,
    pub total_users: u64,
}

impl RawStationReading {
    /// Parses every field; the first unparseable one is reported as `MalformedField`.
    pub fn parse(&self) -> Result<StationReading, TelemetryError> {
        let station_id = match &self.id_estacion {
            Some(serde_json::Value::Number(n)) => n
                .as_i64()
                .map(StationId::Number)
                .ok_or_else(|| malformed("<unknown>", "id_estacion", &n.to_string()))?,
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => {
                StationId::Text(s.clone())
            }
            Some(other) => return Err(malformed("<unknown>", "id_estacion", &other.to_string())),
            None => return Err(malformed("<unknown>", "id_estacion", "null")),
        };
        let station = station_id.to_string();

        let recorded_at = match &self.fecha_registro {
            Some(serde_json::Value::String(s)) => {
                parse_timestamp(s).ok_or_else(|| malformed(&station, "fecha_registro", s))?
            }
            Some(other) => {
                return Err(malformed(&station, "fecha_registro", &other.to_string()));
            }
            None => return Err(malformed(&station, "fecha_registro", "null")),
        };

        Ok(StationReading {
            station_id,
            recorded_at,
            sunlight: self.luz_solar == serde_json::Value::Bool(true),
            battery_level: decimal(&station, "estado_carga", &self.estado_carga)?,
            stored_power: decimal(&station, "potencia_almacenada", &self.potencia_almacenada)?,
            panel_voltage: decimal(&station, "voltaje_panel", &self.voltaje_panel)?,
            total_users: count(&station, "usuarios_totales", &self.usuarios_totales)?,
        })
    }
}

fn malformed(station: &str, field: &'static str, value: &str) -> TelemetryError {
    TelemetryError::MalformedField {
        station: station.to_string(),
        field,
        value: value.to_string(),
    }
}

fn decimal(
    station: &str,
    field: &'static str,
    value: &Option<FieldValue>,
) -> Result<f64, TelemetryError> {
    match value {
        Some(v) => v
            .as_decimal()
            .ok_or_else(|| malformed(station, field, &v.to_string())),
        None => Err(malformed(station, field, "null")),
    }
}

fn count(
    station: &str,
    field: &'static str,
    value: &Option<FieldValue>,
) -> Result<u64, TelemetryError> {
    match value {
        Some(v) => v
            .as_count()
            .ok_or_else(|| malformed(station, field, &v.to_string())),
        None => Err(malformed(station, field, "null")),
    }
}

/// RFC 3339, or a naive `T`/space separated timestamp taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Parses a whole reading set, skipping (and logging) entries with a malformed field.
/// `set` names the collection in log output ("historical" / "latest").
pub fn parse_readings(raw: Vec<RawStationReading>, set: &'static str) -> Vec<StationReading> {
    let received = raw.len();
    let parsed: Vec<StationReading> = raw
        .iter()
        .filter_map(|r| match r.parse() {
            Ok(reading) => Some(reading),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    reading_set = set,
                    operation = "parse_reading",
                    "skipping malformed reading"
                );
                None
            }
        })
        .collect();
    if parsed.len() < received {
        tracing::info!(
            reading_set = set,
            received,
            skipped = received - parsed.len(),
            "readings skipped"
        );
    }
    parsed
}
