//! # Parking Core
//!
//! This crate provides slot allocation and billing for the Parking Lot Tracker.
//! It assigns free slots to arriving vehicles, keeps the session ledger, computes
//! fees on departure and releases slots, all behind a single [`AllocationEngine`].

/// Time sources used to stamp check-in and check-out
pub mod clock;
/// Lot configuration loaded at startup
pub mod config;
/// Allocation engine orchestrating entries and exits
pub mod engine;
/// Fee calculation and rate lookup
pub mod fee;
/// Parking sessions keyed by plate
pub mod session_ledger;
/// Slot catalog and occupancy
pub mod slot_registry;
/// Domain types and errors
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LotConfig;
pub use engine::{AllocationEngine, MAX_RECENT_SESSIONS};
pub use fee::{Fee, RateTable, calculate_fee};
pub use types::*;
