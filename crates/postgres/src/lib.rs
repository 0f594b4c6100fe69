//! # Postgres
//!
//! This crate lets the Parking Lot Tracker keep its slot catalog in a PostgreSQL database.

/// Durable slot catalog stored in the `parking_slots` table.
pub mod catalog;
/// Database client for the parking lot tracker application.
pub mod database;
