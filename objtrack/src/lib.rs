//! ObjTrack - detection and tracking orchestration for known 3-D models
//!
//! This library decides when and where to look for known object models in a
//! live spatial environment. It hands search queries to an external
//! detection backend, keeps a consistent registry of the instances the
//! backend reports, and assigns each instance a tracking fidelity.
//!
//! # Architecture
//!
//! ```text
//!   backend threads                    tick task
//!  ┌───────────────┐   TrackerEvent   ┌────────────────────────────────────┐
//!  │ Detection     │ ───────────────► │ ObjectTracker                      │
//!  │ Backend       │                  │  registry ─ pruner ─ mode manager  │
//!  │ (callbacks)   │ ◄─────────────── │  refiner ─ scheduler               │
//!  └───────────────┘  detect / modes  └────────────────────────────────────┘
//!                                                │ TrackerStatus
//!                                                ▼
//!                                         other readers
//! ```
//!
//! A single task owns all tracking state. Backends and the detection task
//! communicate with it only through the event queue and the in-flight flag.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use objtrack::backend::{FixedCamera, SimulatedBackend};
//! use objtrack::catalog::InMemoryCatalog;
//! use objtrack::config::TrackerConfig;
//! use objtrack::events::event_queue;
//! use objtrack::geometry::Pose;
//! use objtrack::orchestrator::{ObjectTracker, TrackerServices};
//!
//! # async fn demo() {
//! let (sender, queue) = event_queue();
//! let services = TrackerServices::new(
//!     Arc::new(SimulatedBackend::new(sender.clone())),
//!     Arc::new(InMemoryCatalog::new()),
//!     Arc::new(FixedCamera(Pose::identity())),
//! );
//! let tracker = ObjectTracker::new(TrackerConfig::default(), services, sender, queue);
//! tracker.run(tokio_util::sync::CancellationToken::new()).await;
//! # }
//! ```

pub mod backend;
pub mod catalog;
pub mod config;
pub mod diagnostics;
pub mod events;
pub mod geometry;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod query;
pub mod registry;
pub mod scheduler;
pub mod telemetry;
pub mod tracking_mode;

pub use backend::{BackendError, BackendStatus, CameraProvider, DetectionBackend};
pub use catalog::{InMemoryCatalog, ModelCatalog, ModelEntry};
pub use config::{ConfigError, TrackerConfig};
pub use events::{event_queue, EventQueue, EventSender, TrackerEvent};
pub use model::{InstanceId, ModelId, TrackedInstance, TrackingMode};
pub use orchestrator::{ObjectTracker, SharedTrackerStatus, TrackerServices, TrackerStatus};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
