//! Query composition, drill-down and tab state for the stats dashboard.
//!
//! Everything in this crate is synchronous and free of I/O apart from the
//! injected [`storage::KeyValueStore`]. The async fetch side lives in
//! `statsboard-client`.

pub mod breakdown;
pub mod config;
pub mod drilldown;
pub mod error;
pub mod filters;
pub mod metrics;
pub mod query;
pub mod report;
pub mod storage;
pub mod tabs;
