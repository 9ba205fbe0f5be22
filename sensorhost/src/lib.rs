//! Sensor polling daemon serving current readings as JSON artifacts.
//!
//! This crate polls a configured set of named sensors on a fixed interval,
//! keeps the latest snapshot per sensor in memory, mirrors each snapshot to
//! an atomically replaced JSON file, and serves those files over HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  SensorReader   │────>│    Poll Loop    │────>│ Store + Artifacts│
//! │  (capability)   │     │  (one task)     │     │ (latest per name)│
//! └─────────────────┘     └─────────────────┘     └────────┬────────┘
//!                                                          │
//!                                                 ┌────────v────────┐
//!                                                 │   HTTP Server   │
//!                                                 │ (/{s}/current.json)
//!                                                 └─────────────────┘
//! ```
//!
//! # Usage
//!
//! Run the daemon binary with a configuration file:
//!
//! ```bash
//! sensorhost --config sensorhost.json5
//! ```
//!
//! # Configuration
//!
//! See [`sensorhost_common::HostConfig`] for configuration options.

pub mod artifact;
pub mod control;
pub mod host;
pub mod http;
pub mod poller;
pub mod sensor;
pub mod store;

pub use artifact::{ArtifactError, ArtifactWriter};
pub use control::{HostCommand, RefreshResponse, StatusResponse};
pub use host::{HostError, Lifecycle, SensorHost};
pub use http::HttpServer;
pub use poller::PollLoop;
pub use sensor::{SensorError, SensorReader, StaticReader, SysinfoReader};
pub use store::{SharedStore, SnapshotStore};
