// Error taxonomy for one refresh cycle.
// Every variant renders as the single message handed to the subscriber.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Request never produced a response (connect, timeout, body read).
    #[error("telemetry request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("telemetry endpoint {endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    /// Body was not the JSON shape the endpoint promises (e.g. latest readings not an array).
    #[error("telemetry endpoint {endpoint} returned an unexpected body: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no station data available: latest readings are empty")]
    EmptyFleet,

    #[error("invalid telemetry base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("invalid station id {0:?}")]
    InvalidStationId(String),

    #[error("station {station}: field {field} has unparseable value {value:?}")]
    MalformedField {
        station: String,
        field: &'static str,
        value: String,
    },
}

impl TelemetryError {
    /// Short machine-friendly kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryError::Transport { .. } => "transport",
            TelemetryError::Status { .. } => "status",
            TelemetryError::Decode { .. } => "decode",
            TelemetryError::EmptyFleet => "empty_fleet",
            TelemetryError::InvalidBaseUrl { .. } => "invalid_base_url",
            TelemetryError::InvalidStationId(_) => "invalid_station_id",
            TelemetryError::MalformedField { .. } => "malformed_field",
        }
    }
}
