//! Refresh coordinator: at most one token refresh in flight at a time.
//!
//! States are `Idle` and `InFlight(handle)`. The first caller to need a
//! refresh starts the operation and records its shared handle; every caller
//! arriving while it is in flight awaits that same handle. The slot returns
//! to `Idle` as soon as the operation settles, inside the operation itself,
//! so a later unrelated 401 starts a fresh refresh and never observes a
//! stale outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::ApiResult;
use crate::session::TokenPair;

type SharedRefresh = Shared<BoxFuture<'static, ApiResult<TokenPair>>>;

struct InFlight {
    generation: u64,
    handle: SharedRefresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    InFlight { generation: u64 },
}

#[derive(Clone, Default)]
pub struct RefreshCoordinator {
    slot: Arc<Mutex<Option<InFlight>>>,
    generation: Arc<AtomicU64>,
}

impl RefreshCoordinator {
    pub fn new() -> Self { Self::default() }

    pub fn state(&self) -> CoordinatorState {
        match self.slot.lock().as_ref() {
            Some(f) => CoordinatorState::InFlight { generation: f.generation },
            None => CoordinatorState::Idle,
        }
    }

    /// Number of refresh operations started so far.
    pub fn refreshes_started(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Join the in-flight refresh, or start one with `start` when idle.
    /// `start` is only called by the caller that finds the coordinator idle.
    pub async fn run<F>(&self, start: F) -> ApiResult<TokenPair>
    where
        F: FnOnce() -> BoxFuture<'static, ApiResult<TokenPair>>,
    {
        let (handle, generation, leader) = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some(f) => (f.handle.clone(), f.generation, false),
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    let op = start();
                    let slot_ref = self.slot.clone();
                    let handle = async move {
                        let out = op.await;
                        let mut s = slot_ref.lock();
                        if s.as_ref().map(|f| f.generation) == Some(generation) {
                            *s = None;
                        }
                        out
                    }
                    .boxed()
                    .shared();
                    *slot = Some(InFlight { generation, handle: handle.clone() });
                    (handle, generation, true)
                }
            }
        };
        debug!(target: "refresh", "awaiting refresh generation={} leader={}", generation, leader);
        handle.await
    }
}
