//! Federated search service
//!
//! One search request spans several content repositories that share a single
//! search backend. Each repository contributes a security filter, the caller's
//! invisible workflow stages are excluded, and results are fanned back out per
//! repository. See [`federation`] for the engine and [`api`] for the HTTP
//! surface.

pub mod api;
pub mod config;
pub mod error;
pub mod federation;
pub mod metrics;

pub use error::{AppError, Result};
