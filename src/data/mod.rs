//! The stats engine: endpoint availability and per-family calculators.
//!
//! ## Submodules
//!
//! - [`registry`]: Which optional status sections the server exposes
//! - [`family`]: Metric families and their static field tables
//! - [`field`]: Extracting counters from entity objects
//! - [`calculator`]: The generic delta / rate / history / flag state machine
//! - [`engine`]: One calculator per family, run once per poll
//! - [`history`]: Bounded per-entity series for charts
//! - [`clock`]: Poll timestamps (monotonic for rates, wall clock for display)
//! - [`view`]: The view-models consumers read
//! - [`duration`]: Parsing of interval strings (e.g., "1s", "500ms")
//!
//! ## Data Flow
//!
//! ```text
//! StatusSnapshot (decoded JSON)
//!        │
//!        ├──▶ EndpointRegistry::sync()
//!        │
//!        └──▶ Engine::compute()
//!                 │
//!                 └──▶ Calculator::calculate() per family ──▶ FamilyView
//! ```

pub mod calculator;
pub mod clock;
pub mod duration;
pub mod engine;
pub mod family;
pub mod field;
pub mod history;
pub mod registry;
pub mod view;

pub use calculator::Calculator;
pub use clock::PollTime;
pub use engine::{Cycle, Engine};
pub use family::{Family, FamilySpec};
pub use history::{HistoryPoint, Series, DEFAULT_HISTORY_SIZE};
pub use registry::{EndpointPath, EndpointRegistry, Namespace};
pub use view::{EntityView, FamilyView};
