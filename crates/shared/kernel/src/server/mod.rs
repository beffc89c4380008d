//! HTTP plumbing shared by every slice: state, auth extraction, errors and system routes.

pub mod auth;
pub mod error;
mod health;
pub mod router;
pub mod state;
mod tasks;

pub use auth::AuthUser;
pub use error::ApiError;
pub use state::{ApiState, ApiStateBuilder, ApiStateError};
