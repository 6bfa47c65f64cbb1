use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::debug;

use super::backend::{Change, MemoryBackend, SessionBackend, StorageSignal};
use super::role::UserRole;
use super::token::TokenPair;
use crate::error::ApiResult;

pub const ACCESS_TOKEN_KEY: &str = "pp_access_token";
pub const REFRESH_TOKEN_KEY: &str = "pp_refresh_token";
pub const ROLE_KEY: &str = "pp_role";
pub const ORG_KEY: &str = "pp_org_id";
pub const USER_ID_KEY: &str = "pp_user_id";

const ALL_KEYS: [&str; 5] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, ROLE_KEY, ORG_KEY, USER_ID_KEY];

// Handle ids start at 1; 0 marks signals not written through any handle.
static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// In-process auth-changed event. Carries no payload: observers re-read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthChanged;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    /// Mutation through this handle.
    Local,
    /// Mutation through another handle sharing the storage.
    Storage,
}

/// All session fields read under one backend lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub role: Option<UserRole>,
    pub org_id: Option<String>,
    pub user_id: Option<i64>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.as_deref().map(|t| !t.is_empty()).unwrap_or(false)
    }
}

/// Handle onto the persisted session record.
///
/// Every `set` and `clear` is one atomic backend batch followed by an
/// in-process `AuthChanged` event; other handles on the same backend observe
/// the backend's storage signal instead.
pub struct SessionStore {
    id: u64,
    backend: Arc<dyn SessionBackend>,
    events: broadcast::Sender<AuthChanged>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        let (events, _) = broadcast::channel(64);
        let id = NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed);
        Self { id, backend, events }
    }

    /// Store over a fresh, private in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn id(&self) -> u64 { self.id }

    pub fn backend(&self) -> &Arc<dyn SessionBackend> { &self.backend }

    pub fn set(
        &self,
        access_token: &str,
        refresh_token: &str,
        role: UserRole,
        org_id: Option<&str>,
        user_id: Option<i64>,
    ) -> ApiResult<()> {
        let mut changes = vec![
            Change::Set(ACCESS_TOKEN_KEY.into(), access_token.into()),
            Change::Set(REFRESH_TOKEN_KEY.into(), refresh_token.into()),
            Change::Set(ROLE_KEY.into(), role.as_str().into()),
        ];
        match org_id.filter(|o| !o.is_empty()) {
            Some(o) => changes.push(Change::Set(ORG_KEY.into(), o.into())),
            None => changes.push(Change::Remove(ORG_KEY.into())),
        }
        match user_id {
            Some(u) => changes.push(Change::Set(USER_ID_KEY.into(), u.to_string())),
            None => changes.push(Change::Remove(USER_ID_KEY.into())),
        }
        let res = self.backend.apply(self.id, &changes);
        debug!(target: "session", "session set handle={} role={} org={:?} user={:?}", self.id, role, org_id, user_id);
        self.emit();
        res
    }

    pub fn set_tokens(&self, pair: &TokenPair) -> ApiResult<()> {
        self.set(&pair.access_token, &pair.refresh_token, pair.role, pair.org_id.as_deref(), pair.user_id)
    }

    /// Erase every field. Safe to call on an already empty session.
    pub fn clear(&self) -> ApiResult<()> {
        let changes: Vec<Change> = ALL_KEYS.iter().map(|k| Change::Remove((*k).to_string())).collect();
        let res = self.backend.apply(self.id, &changes);
        debug!(target: "session", "session cleared handle={}", self.id);
        self.emit();
        res
    }

    fn emit(&self) {
        // No receivers is fine: nobody is watching.
        let _ = self.events.send(AuthChanged);
    }

    pub fn get_access_token(&self) -> Option<String> { self.backend.get(ACCESS_TOKEN_KEY) }

    pub fn get_refresh_token(&self) -> Option<String> { self.backend.get(REFRESH_TOKEN_KEY) }

    pub fn get_role(&self) -> Option<UserRole> {
        self.backend.get(ROLE_KEY).and_then(|v| v.parse().ok())
    }

    pub fn get_org_id(&self) -> Option<String> {
        self.backend.get(ORG_KEY).filter(|v| !v.is_empty())
    }

    pub fn get_user_id(&self) -> Option<i64> {
        self.backend.get(USER_ID_KEY).and_then(|v| v.trim().parse().ok())
    }

    pub fn is_authenticated(&self) -> bool {
        self.get_access_token().map(|t| !t.is_empty()).unwrap_or(false)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut vals = self.backend.read(&ALL_KEYS).into_iter();
        let mut next = || vals.next().flatten();
        let access_token = next();
        let refresh_token = next();
        let role = next().and_then(|v| v.parse().ok());
        let org_id = next().filter(|v| !v.is_empty());
        let user_id = next().and_then(|v| v.trim().parse().ok());
        SessionSnapshot { access_token, refresh_token, role, org_id, user_id }
    }

    pub fn subscribe(&self) -> AuthWatcher {
        AuthWatcher { own_id: self.id, local: self.events.subscribe(), storage: self.backend.subscribe() }
    }
}

/// Push-based observer of session changes from this handle and from any
/// other handle sharing the backend.
pub struct AuthWatcher {
    own_id: u64,
    local: broadcast::Receiver<AuthChanged>,
    storage: broadcast::Receiver<StorageSignal>,
}

impl AuthWatcher {
    /// Wait for the next change. Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<ChangeSource> {
        let own_id = self.own_id;
        loop {
            tokio::select! {
                r = self.local.recv() => match r {
                    Ok(_) | Err(RecvError::Lagged(_)) => return Some(ChangeSource::Local),
                    Err(RecvError::Closed) => return None,
                },
                r = self.storage.recv() => match r {
                    Ok(sig) if sig.origin == own_id => continue,
                    Ok(_) | Err(RecvError::Lagged(_)) => return Some(ChangeSource::Storage),
                    Err(RecvError::Closed) => return None,
                },
            }
        }
    }

    /// Drain notifications already delivered, without waiting.
    pub fn pending(&mut self) -> Vec<ChangeSource> {
        let mut out = Vec::new();
        loop {
            match self.local.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => out.push(ChangeSource::Local),
                Err(_) => break,
            }
        }
        loop {
            match self.storage.try_recv() {
                Ok(sig) if sig.origin == self.own_id => {}
                Ok(_) | Err(TryRecvError::Lagged(_)) => out.push(ChangeSource::Storage),
                Err(_) => break,
            }
        }
        out
    }
}
