//! Occupancy Sensor Agent - long-running telemetry agent for a single
//! motion or IR sensor on a constrained device.
//!
//! The agent samples a binary event signal at a fixed polling cadence,
//! accumulates event counts into fixed-size, epoch-aligned time windows, and
//! periodically hands completed windows to a remote store. Delivery is
//! at-least-once while the process is alive: a failed flush retains every
//! closed window for the next attempt, and a window leaves the backlog only
//! after the store confirms it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 Occupancy Sensor Agent                   │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌─────────┐    ┌────────────┐    ┌───────────────────┐  │
//! │  │ Sampler │──▶│ Aggregator │──▶│ DeliveryScheduler │  │
//! │  │ (1 tick)│    │ (windows + │    │ (flush boundary,  │  │
//! │  └─────────┘    │  backlog)  │    │  worker thread)   │  │
//! │       │         └────────────┘    └─────────┬─────────┘  │
//! │       ▼                                     ▼            │
//! │  ┌─────────┐                         ┌────────────┐      │
//! │  │ Sensor  │                         │   Remote   │      │
//! │  │ (GPIO)  │                         │   Store    │      │
//! │  └─────────┘                         └────────────┘      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Sampler, Aggregator and scheduler eligibility checks run strictly
//! in-order on one loop thread; only the store round trip itself runs on a
//! worker, receiving backlog snapshots by value and reporting back over a
//! channel. At most one delivery attempt is in flight at a time.

pub mod config;
pub mod core;
pub mod delivery;
pub mod logfile;
pub mod sensor;

// Re-export key types at crate root for convenience
pub use config::{AgentConfig, ConfigError};
pub use core::{Aggregator, DeliveryScheduler, Observation, Sampler, Window};
pub use delivery::{
    BlockingStoreClient, DeliveryError, DeliverySink, StoreClient, StoreConfig, WindowBatch,
    WindowRecord,
};
pub use logfile::{open_shared_log, EventLog, SharedEventLog};
pub use sensor::{PulseSource, Sensor, SensorInitError, SensorKind, SimPulseSource};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
