// Telemetry API client. The scheduler only sees the `TelemetrySource` trait so
// cycles can be driven by an in-memory source in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::error::TelemetryError;
use crate::models::RawStationReading;

const HISTORY_SEGMENT: &str = "datos";
const LATEST_SEGMENT: &str = "ultimas-lecturas";

#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Every reading the API holds, all stations, any order.
    async fn fetch_history(&self) -> Result<Vec<RawStationReading>, TelemetryError>;

    /// At most one reading per station.
    async fn fetch_latest(&self) -> Result<Vec<RawStationReading>, TelemetryError>;

    /// Detail document for one station, passed through as JSON.
    async fn fetch_station(&self, station_id: &str) -> Result<serde_json::Value, TelemetryError>;
}

pub struct HttpTelemetrySource {
    base: Url,
    client: reqwest::Client,
}

impl HttpTelemetrySource {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, TelemetryError> {
        let base = Url::parse(base_url).map_err(|e| TelemetryError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(TelemetryError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "URL cannot carry a path".to_string(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|source| TelemetryError::Transport {
                endpoint: base_url.to_string(),
                source,
            })?;
        Ok(Self { base, client })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// Base URL plus `segments`, each percent-encoded as a single path segment
    /// ('/', '?' and '#' inside a segment never change the request target).
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, TelemetryError> {
        let endpoint = url.to_string();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| TelemetryError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| TelemetryError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;
        serde_json::from_slice(&body).map_err(|source| TelemetryError::Decode { endpoint, source })
    }

    /// The body must be a JSON array; entries that are not reading objects are skipped.
    async fn get_readings(&self, segment: &str) -> Result<Vec<RawStationReading>, TelemetryError> {
        let entries: Vec<serde_json::Value> = self.get_json(self.endpoint(&[segment])).await?;
        let received = entries.len();
        let readings: Vec<RawStationReading> = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(reading) => Some(reading),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        endpoint = segment,
                        operation = "decode_reading",
                        "skipping entry that is not a reading object"
                    );
                    None
                }
            })
            .collect();
        if readings.len() < received {
            tracing::info!(
                endpoint = segment,
                received,
                skipped = received - readings.len(),
                "entries skipped"
            );
        }
        Ok(readings)
    }
}

#[async_trait]
impl TelemetrySource for HttpTelemetrySource {
    #[instrument(skip(self), fields(source = "http", operation = "fetch_history"))]
    async fn fetch_history(&self) -> Result<Vec<RawStationReading>, TelemetryError> {
        let readings = self.get_readings(HISTORY_SEGMENT).await?;
        tracing::debug!(readings = readings.len(), "historical readings fetched");
        Ok(readings)
    }

    #[instrument(skip(self), fields(source = "http", operation = "fetch_latest"))]
    async fn fetch_latest(&self) -> Result<Vec<RawStationReading>, TelemetryError> {
        let readings = self.get_readings(LATEST_SEGMENT).await?;
        if readings.is_empty() {
            return Err(TelemetryError::EmptyFleet);
        }
        tracing::debug!(readings = readings.len(), "latest readings fetched");
        Ok(readings)
    }

    #[instrument(skip(self), fields(source = "http", operation = "fetch_station"))]
    async fn fetch_station(&self, station_id: &str) -> Result<serde_json::Value, TelemetryError> {
        // "." and ".." would be dropped or resolved as path segments.
        if matches!(station_id.trim(), "" | "." | "..") {
            return Err(TelemetryError::InvalidStationId(station_id.to_string()));
        }
        self.get_json(self.endpoint(&[HISTORY_SEGMENT, station_id]))
            .await
    }
}
