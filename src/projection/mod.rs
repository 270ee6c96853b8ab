//! Projection module
//!
//! Dashboard read models derived from the document store.

mod service;

pub use service::{AdminStats, OrganizerStats, ProjectionService};
