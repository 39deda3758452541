//! Async side of the stats dashboard: transport, fetch cycles and the
//! composite report controllers built on `statsboard-core`.

pub mod api;
pub mod breakdown;
pub mod devices;
pub mod error;
pub mod locations;
pub mod modal;

pub use api::{HttpStatsApi, StatsApi};
pub use breakdown::{BreakdownView, FetchOutcome, FetchState};
pub use error::FetchError;
