//! Core library for storkval.
//!
//! Keeps an authenticated session against the Stork oracle API, runs the
//! periodic fetch-stats / fetch-prices / submit-validation cycle, and exposes
//! the latest snapshot for a status display.
//!
//! - `auth`: access token lifecycle and the pluggable credential provider
//! - `api`: HTTP client for the oracle endpoints
//! - `validation`: one validation cycle and its effect on `DisplayState`
//! - `scheduler`: the two periodic activities (validation and render)
//! - `report`: pure projection of `DisplayState` into display lines

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod format;
pub mod models;
pub mod report;
pub mod scheduler;
pub mod state;
pub mod validation;

pub use config::Config;
pub use error::CycleError;
pub use scheduler::PollingScheduler;
pub use state::{CycleStatus, DisplayState};
pub use validation::ValidationClient;
