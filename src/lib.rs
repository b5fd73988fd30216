//! Full-text article search for a blog backend.
//!
//! - [`search`]: analyzers, the directory-backed index store, query building
//!   and result presentation
//! - [`sync`]: the event pipeline keeping the index and article totals in
//!   step with the relational store

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod search;
pub mod sync;

pub use config::Config;
pub use error::{AppError, Result};
