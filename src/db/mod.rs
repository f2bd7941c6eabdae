//! Database module for the battery manager.
//!
//! Provides SQLite storage for devices, readings and alerts with embedded migrations.

mod models;
mod store;

pub use models::*;
pub use store::*;
