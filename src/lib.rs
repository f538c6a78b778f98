//! # angie-console
//!
//! The stats engine behind a live status dashboard for Angie/nginx-style
//! web servers.
//!
//! A status API exposes monotonically increasing counters (requests,
//! bytes, response codes) and live gauges (active connections, cache size).
//! This crate sits between the raw polled documents and whatever renders
//! them: it tracks which optional status sections the server exposes, turns
//! consecutive counter readings into per-second rates, keeps a bounded
//! history per entity for charts, and raises transient "changed" flags when
//! error counters grow.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           App (session)                          │
//! │  ┌─────────┐   ┌──────────────────┐   ┌─────────┐   ┌──────────┐ │
//! │  │ source  │──▶│ EndpointRegistry │   │         │   │          │ │
//! │  │ (input) │   └──────────────────┘   │   bus   │──▶│ consumers│ │
//! │  │         │──▶ Engine ─▶ Calculator ▶│ (Latest)│   │          │ │
//! │  └─────────┘      (one per family)    └─────────┘   └──────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`app`]**: The session object owning all mutable state and the poll loop
//! - **[`source`]**: Data source abstraction ([`DataSource`] trait) with
//!   implementations for file polling, byte streams, and channels
//! - **[`data`]**: Endpoint registry, metric families, calculators and view-models
//! - **[`bus`]**: Subscriptions and synchronous reads of the latest views
//!
//! ## Usage
//!
//! ```
//! use angie_console::{App, ChannelSource, EndpointPath, Latest, Namespace, Settings};
//!
//! let (tx, source) = ChannelSource::create("http://127.0.0.1/status/");
//! let mut app = App::new(Box::new(source), &Settings::default());
//!
//! let zones = EndpointPath::nested(Namespace::Http, "server_zones");
//! app.subscribe([zones.clone()], Box::new(|latest: &Latest| {
//!     println!("cycle {}", latest.cycle());
//! }));
//!
//! let snapshot = angie_console::StatusSnapshot::parse(
//!     r#"{"http":{"server_zones":{"example.com":{"requests":{"total":1}}}}}"#,
//! )
//! .unwrap();
//! tx.send(snapshot).unwrap();
//! app.reload_data().unwrap();
//!
//! assert!(app.get(&[zones])[0].is_available());
//! ```

pub mod app;
pub mod bus;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod source;

// Re-export main types for convenience
pub use app::App;
pub use bus::{Availability, Bus, Callback, Latest};
pub use config::Settings;
pub use data::{
    EndpointPath, EndpointRegistry, EntityView, Family, FamilyView, HistoryPoint, Namespace,
    PollTime,
};
pub use error::ConsoleError;
pub use source::{ChannelSource, DataSource, FileSource, StatusSnapshot, StreamSource};
