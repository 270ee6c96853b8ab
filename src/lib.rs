//! EventCity Library
//!
//! Re-exports modules for integration testing and the binaries.

pub mod api;
pub mod cache;
pub mod domain;
pub mod handlers;
pub mod identity;
pub mod jobs;
pub mod projection;
pub mod provision;
pub mod session;
pub mod store;

pub mod config;
pub mod db;
pub mod error;

pub use config::Config;
pub use domain::{DomainError, OperationContext};
pub use error::{AppError, AppResult};
