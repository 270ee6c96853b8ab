//! Domain module
//!
//! Core domain types and business rules.

pub mod account;
pub mod context;
pub mod engagement;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod page;

pub use account::{Account, AuthStatus, NewAccount, OrganizerProfile, ProfileChanges, Role};
pub use context::OperationContext;
pub use engagement::{Favorite, Registration, RegistrationStatus, ViewRecord};
pub use error::DomainError;
pub use event::{Event, EventCategory, EventDetail, EventFilters, EventPatch, EventRecord, NewEvent};
pub use lifecycle::{available_actions, transition, EventStatus, StatusAction};
pub use page::{Page, PageInfo};
