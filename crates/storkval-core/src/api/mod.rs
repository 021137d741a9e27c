//! REST API client module for the Stork oracle service.
//!
//! `OracleApi` is the seam the validation cycle talks to; `StorkClient`
//! implements it over reqwest with bearer token authentication.

pub mod client;
pub mod error;

pub use client::{OracleApi, StorkClient};
pub use error::ApiError;
