//! Signalement core types: status policy, token storage and settings

#[macro_use]
extern crate tracing;

pub mod config;
pub mod error;
pub mod session;
pub mod status;
pub mod storage;
pub mod validation;

pub use self::config::ClientSettings;
pub use error::{CoreError, CoreResult};
pub use session::{RouteDecision, Session, SessionStore, UiPreferences, guard_route};
pub use status::{
    IncidentStatus, IncidentType, PriorityLevel, ProofType, StatusChange, StatusTransitionTable,
    TRANSITIONS, TransitionError, UserRole, allowed_next_statuses,
};
pub use storage::{
    CookieJar, CookiePolicy, FileStorage, MemoryStorage, Persistence, SameSite, StorageBackend,
    TokenStore,
};
