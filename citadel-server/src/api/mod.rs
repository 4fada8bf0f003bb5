//! The JSON API.

mod auth;
mod entries;
mod error;
mod pagination;
mod prompt;
mod server;
mod sessions;
mod subscriptions;
mod timeline;
mod viewer;

pub use error::{ApiError, ApiResult};
pub use server::{build_router, AppState};
pub use sessions::{cookie_key, CurrentUser, Session, SESSION_COOKIE};
