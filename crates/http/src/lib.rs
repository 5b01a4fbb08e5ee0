//! Signalement HTTP client
//!
//! Request core, error normalization, the refresh-and-retry session client
//! and the typed endpoint services of the signalement admin API.

#[macro_use]
extern crate tracing;

pub mod client;
pub mod routes;
pub mod types;
pub mod view;

pub use client::error::{ApiError, ErrorCategory, ErrorType, IntoApiError, normalize};
pub use client::interceptor::{EndReason, NoopListener, SessionClient, SessionEnded, SessionListener};
pub use client::service::{ErrorKind, ServiceError, TypedService, make_service};
pub use client::{ApiClient, ApiClientBuilder, ApiRequest, MultipartForm, RequestBody};
pub use view::{DetailLoader, LoadOutcome, ViewState};
