//! Client-side session: persisted token record, change notification and
//! the navigation guard that observes it.

mod backend;
mod guard;
mod role;
mod store;
mod token;

pub use backend::{Change, FileBackend, MemoryBackend, SessionBackend, StorageSignal};
pub use guard::{GuardDecision, RouteGuard, View};
pub use role::UserRole;
pub use store::{
    AuthChanged, AuthWatcher, ChangeSource, SessionSnapshot, SessionStore,
    ACCESS_TOKEN_KEY, ORG_KEY, REFRESH_TOKEN_KEY, ROLE_KEY, USER_ID_KEY,
};
pub use token::{access_token_expiry, is_expired_at, TokenPair};
pub(crate) use token::lenient_org_id;
