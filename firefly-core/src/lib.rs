//! # firefly-core
//!
//! Core delivery pipeline for the firefly telemetry SDK.
//!
//! This library provides:
//! - An ordered, bounded in-memory event queue
//! - Flush scheduling on size/time thresholds and host lifecycle signals
//! - Two-tier delivery (fire-and-forget beacon, awaited fetch fallback)
//! - Durable offline persistence of failed batches with next-session retry
//!
//! ## Architecture
//!
//! Producers hand events to a [`Tracker`]; everything downstream runs on a
//! single pipeline task:
//!
//! ```text
//! track() → EventQueue → FlushScheduler → DeliveryStrategy → endpoint
//!                                              │ (failure)
//!                                              └→ OfflineStore → retry next session
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use firefly_core::{PipelineConfig, Tracker};
//!
//! # async fn example() -> firefly_core::Result<()> {
//! let config = PipelineConfig {
//!     endpoint_url: Some("https://telemetry.example.com/events".to_string()),
//!     ..Default::default()
//! };
//!
//! let tracker = Tracker::new(config)?;
//! tracker.track("click", serde_json::json!({ "target": "#buy" }))?;
//!
//! // Host signals page-hide/unload
//! tracker.page_hidden()?;
//! # tracker.shutdown().await
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, LoggingConfig, PipelineConfig};
pub use error::{Error, Result};
pub use event::{Batch, StoredBatchRecord, TrackedEvent};
pub use pipeline::{EventSubscriber, PipelineStats, Tracker};

// Public modules
pub mod config;
pub mod delivery;
pub mod error;
pub mod event;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod scheduler;
pub mod store;
