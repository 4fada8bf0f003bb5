//! Shared core for the citadel services: domain models, the SQLite store,
//! configuration, and the error taxonomy.

pub mod config;
pub mod db;
pub mod error;
pub mod id;
pub mod models;
pub mod time;

pub use error::{Detail, Error, Result};
pub use time::DbTime;
