//! Delivery of window batches to the remote store.
//!
//! The core only needs a success/failure signal per attempt; everything about
//! transport and encoding lives here. The HTTP client is async, with a
//! blocking wrapper over a current-thread runtime for use from the delivery
//! worker thread.

use crate::core::Window;
use crate::sensor::SensorKind;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Remote store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the store, e.g. `http://127.0.0.1:8080`
    pub base_url: String,
    /// Optional bearer authentication token
    pub token: Option<String>,
}

impl StoreConfig {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, token }
    }

    /// Ingest endpoint for window batches.
    pub fn ingest_url(&self) -> String {
        format!("{}/v1/windows", self.base_url)
    }

    /// Health check endpoint.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }
}

/// Delivery error types. Transient from the agent's point of view: a failed
/// attempt is retried at the next flush boundary, never escalated.
#[derive(Debug)]
pub enum DeliveryError {
    /// Configuration error
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Store returned an error response
    Server { status: u16, message: String },
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::Config(msg) => write!(f, "Store config error: {msg}"),
            DeliveryError::Network(msg) => write!(f, "Store network error: {msg}"),
            DeliveryError::Server { status, message } => {
                write!(f, "Store server error ({status}): {message}")
            }
        }
    }
}

impl std::error::Error for DeliveryError {}

/// One window on the wire: its aligned start and the event count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRecord {
    /// Window start as Unix seconds
    #[serde(rename = "windowStart", with = "chrono::serde::ts_seconds")]
    pub window_start: chrono::DateTime<Utc>,
    /// Events observed in the window
    pub count: u64,
}

impl From<&Window> for WindowRecord {
    fn from(window: &Window) -> Self {
        Self {
            window_start: window.start,
            count: window.count,
        }
    }
}

/// Batch payload for the ingest endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct WindowBatch {
    /// Device identifier
    pub device_id: String,
    /// Sensor variant producing the counts
    pub sensor: String,
    /// Timezone the device reports in
    pub timezone: String,
    /// Time the batch was sent (RFC3339)
    pub sent_at: String,
    /// Windows covered by this batch, oldest first
    pub windows: Vec<WindowRecord>,
    /// Metadata
    pub meta: BatchMeta,
}

/// Batch metadata.
#[derive(Debug, Clone, Serialize)]
pub struct BatchMeta {
    /// Source identifier
    pub source: String,
    /// Agent version
    pub version: String,
    /// Window count
    pub window_count: usize,
}

/// The success/failure contract the scheduler's worker drives.
pub trait DeliverySink: Send {
    fn send(&self, windows: &[Window]) -> Result<(), DeliveryError>;
}

/// Async HTTP client for the remote store.
pub struct StoreClient {
    config: StoreConfig,
    sensor: SensorKind,
    client: reqwest::Client,
    device_id: String,
}

impl StoreClient {
    /// Create a new store client.
    pub fn new(config: StoreConfig, sensor: SensorKind) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        // Generate device ID from hostname + instance
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let device_id = format!(
            "occupancy-{}-{}",
            hostname,
            &uuid::Uuid::new_v4().to_string()[..8]
        );

        Self {
            config,
            sensor,
            client,
            device_id,
        }
    }

    /// Test connection to the store.
    pub async fn test_connection(&self) -> Result<bool, DeliveryError> {
        let response = self
            .client
            .get(self.config.health_url())
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    /// Build the batch payload for a backlog snapshot.
    pub fn build_batch(&self, windows: &[Window]) -> WindowBatch {
        WindowBatch {
            device_id: self.device_id.clone(),
            sensor: self.sensor.to_string(),
            timezone: chrono_tz::Tz::UTC.to_string(),
            sent_at: Utc::now().to_rfc3339(),
            windows: windows.iter().map(WindowRecord::from).collect(),
            meta: BatchMeta {
                source: "occupancy-sensor-agent".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                window_count: windows.len(),
            },
        }
    }

    /// Send one batch covering the given windows.
    pub async fn send_batch(&self, windows: &[Window]) -> Result<(), DeliveryError> {
        if windows.is_empty() {
            return Err(DeliveryError::Config("No windows to send".to_string()));
        }

        let batch = self.build_batch(windows);

        let mut request = self
            .client
            .post(self.config.ingest_url())
            .header("Content-Type", "application/json")
            .json(&batch);
        if let Some(ref token) = self.config.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DeliveryError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }

    /// Get the device ID.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

/// Blocking store client for use from the delivery worker thread.
pub struct BlockingStoreClient {
    inner: StoreClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingStoreClient {
    /// Create a new blocking store client.
    pub fn new(config: StoreConfig, sensor: SensorKind) -> Result<Self, DeliveryError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DeliveryError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            inner: StoreClient::new(config, sensor),
            runtime,
        })
    }

    /// Test connection to the store.
    pub fn test_connection(&self) -> Result<bool, DeliveryError> {
        self.runtime.block_on(self.inner.test_connection())
    }

    /// Get the device ID.
    pub fn device_id(&self) -> &str {
        self.inner.device_id()
    }
}

impl DeliverySink for BlockingStoreClient {
    fn send(&self, windows: &[Window]) -> Result<(), DeliveryError> {
        self.runtime.block_on(self.inner.send_batch(windows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Aggregator;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_store_config_urls() {
        let config = StoreConfig::new("http://127.0.0.1:8080/", None);
        assert_eq!(config.ingest_url(), "http://127.0.0.1:8080/v1/windows");
        assert_eq!(config.health_url(), "http://127.0.0.1:8080/health");
    }

    #[test]
    fn test_window_record_wire_shape() {
        let mut agg = Aggregator::new(
            Duration::from_secs(60),
            Utc.timestamp_opt(0, 0).unwrap(),
        );
        agg.observe(true, Utc.timestamp_opt(5, 0).unwrap());
        agg.observe(true, Utc.timestamp_opt(40, 0).unwrap());
        agg.observe(false, Utc.timestamp_opt(61, 0).unwrap());

        let record = WindowRecord::from(&agg.backlog()[0]);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, serde_json::json!({"windowStart": 0, "count": 2}));
    }

    #[test]
    fn test_batch_payload_contents() {
        let client = StoreClient::new(
            StoreConfig::new("http://127.0.0.1:8080", Some("token".to_string())),
            SensorKind::Ir,
        );
        let mut agg = Aggregator::new(
            Duration::from_secs(60),
            Utc.timestamp_opt(0, 0).unwrap(),
        );
        agg.observe(true, Utc.timestamp_opt(5, 0).unwrap());
        agg.observe(false, Utc.timestamp_opt(121, 0).unwrap());

        let batch = client.build_batch(&agg.snapshot());
        assert_eq!(batch.sensor, "ir");
        assert_eq!(batch.meta.window_count, 2);
        assert_eq!(batch.windows.len(), 2);
        assert_eq!(batch.windows[0].count, 1);
        assert_eq!(batch.windows[1].count, 0);
        assert!(batch.device_id.starts_with("occupancy-"));
    }

    #[test]
    fn test_retried_batch_is_byte_identical() {
        let client = StoreClient::new(
            StoreConfig::new("http://127.0.0.1:8080", None),
            SensorKind::Motion,
        );
        let mut agg = Aggregator::new(
            Duration::from_secs(60),
            Utc.timestamp_opt(0, 0).unwrap(),
        );
        agg.observe(true, Utc.timestamp_opt(5, 0).unwrap());
        agg.observe(false, Utc.timestamp_opt(61, 0).unwrap());

        // Closed windows are immutable, so two attempts over the same
        // snapshot serialize the same window records.
        let first = serde_json::to_string(&client.build_batch(&agg.snapshot()).windows).unwrap();
        let second = serde_json::to_string(&client.build_batch(&agg.snapshot()).windows).unwrap();
        assert_eq!(first, second);
    }
}
