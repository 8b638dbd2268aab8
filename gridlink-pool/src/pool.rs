//! Reusable authenticated handles to one endpoint.
//!
//! The pool keeps two disjoint collections, `free` and `in_use`; every
//! handle it built lives in exactly one of them. Handle construction (which
//! may mean an authentication round trip) runs outside the lock against a
//! reserved slot, so a slow login never blocks `release`.

use crate::config::ReliabilityConfig;
use crate::error::{PoolError, PoolResult};
use gridlink_model::{BatchOutcome, BatchRequest, Entity, EntityHandle, FindQuery, GridResult};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// A handle that carries a reusable session and accepts reliability settings.
pub trait SessionHandle: EntityHandle {
    /// Token of the authenticated session, if one has been established.
    fn session_token(&self) -> Option<String>;

    /// Applies retry and timeout parameters.
    fn configure(&mut self, reliability: &ReliabilityConfig);
}

/// Builds handles for one endpoint.
pub trait Connector: Send + Sync {
    type Handle: SessionHandle;

    /// Full credential login, yielding a handle with a fresh session.
    fn authenticate(&self) -> PoolResult<Self::Handle>;

    /// A new handle sharing an existing session. No login round trip.
    fn resume(&self, session_token: &str) -> PoolResult<Self::Handle>;
}

struct PoolState<H> {
    /// Oldest release at the front.
    free: VecDeque<Arc<H>>,
    in_use: Vec<Arc<H>>,
    /// Slots reserved by `acquire` calls that are still constructing.
    pending: usize,
}

/// Gives back a reserved slot if construction unwinds.
struct PendingSlot<'a, H> {
    state: &'a Mutex<PoolState<H>>,
    armed: bool,
}

impl<H> Drop for PendingSlot<'_, H> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.pending -= 1;
        }
    }
}

/// A bounded (or unbounded) pool of handles built by a [`Connector`].
pub struct ConnectionPool<C: Connector> {
    connector: C,
    max_size: Option<usize>,
    reliability: ReliabilityConfig,
    state: Mutex<PoolState<C::Handle>>,
}

impl<C: Connector> ConnectionPool<C> {
    /// `max_size = None` means unlimited.
    pub fn new(connector: C, max_size: Option<usize>, reliability: ReliabilityConfig) -> Self {
        Self {
            connector,
            max_size,
            reliability,
            state: Mutex::new(PoolState {
                free: VecDeque::new(),
                in_use: Vec::new(),
                pending: 0,
            }),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    pub fn reliability(&self) -> &ReliabilityConfig {
        &self.reliability
    }

    /// Lends out a handle: the oldest free one, else a newly built one.
    ///
    /// Fails with [`PoolError::Exhausted`] when the pool is at capacity and
    /// nothing is free. Construction errors propagate unchanged and release
    /// the reserved slot.
    pub fn acquire(&self) -> PoolResult<Arc<C::Handle>> {
        let token = {
            let mut state = self.state.lock().unwrap();
            if let Some(handle) = state.free.pop_front() {
                state.in_use.push(Arc::clone(&handle));
                debug!(free = state.free.len(), in_use = state.in_use.len(), "reusing free handle");
                return Ok(handle);
            }

            let size = state.free.len() + state.in_use.len() + state.pending;
            if let Some(max_size) = self.max_size.filter(|max| size >= *max) {
                warn!(max_size, "connection pool exhausted");
                return Err(PoolError::Exhausted { max_size });
            }
            state.pending += 1;

            let token = state
                .free
                .iter()
                .chain(state.in_use.iter())
                .find_map(|handle| handle.session_token());
            token
        };

        let mut slot = PendingSlot {
            state: &self.state,
            armed: true,
        };
        let built = self.build(token.as_deref());

        let mut state = self.state.lock().unwrap();
        state.pending -= 1;
        slot.armed = false;
        let handle = Arc::new(built?);
        state.in_use.push(Arc::clone(&handle));
        debug!(free = state.free.len(), in_use = state.in_use.len(), "acquired new handle");
        Ok(handle)
    }

    fn build(&self, session_token: Option<&str>) -> PoolResult<C::Handle> {
        let mut handle = match session_token {
            Some(token) => {
                debug!("building handle on existing session");
                self.connector.resume(token)?
            }
            None => {
                let handle = self.connector.authenticate()?;
                info!("authenticated new session");
                handle
            }
        };
        handle.configure(&self.reliability);
        Ok(handle)
    }

    /// Returns a lent handle to the back of the free list.
    pub fn release(&self, handle: Arc<C::Handle>) -> PoolResult<()> {
        let mut state = self.state.lock().unwrap();
        let Some(position) = state.in_use.iter().position(|h| Arc::ptr_eq(h, &handle)) else {
            warn!("release of a handle that is not in use");
            return Err(PoolError::NotInUse);
        };
        let handle = state.in_use.remove(position);
        state.free.push_back(handle);
        debug!(free = state.free.len(), in_use = state.in_use.len(), "released handle");
        Ok(())
    }

    /// Acquires a handle that is released when the guard drops.
    pub fn scoped(self: &Arc<Self>) -> PoolResult<PooledHandle<C>> {
        let handle = self.acquire()?;
        Ok(PooledHandle {
            pool: Arc::clone(self),
            handle: Some(handle),
        })
    }

    /// Runs `f` with a lent handle, releasing it on every exit path.
    pub fn with_handle<R, E, F>(self: &Arc<Self>, f: F) -> Result<R, E>
    where
        E: From<PoolError>,
        F: FnOnce(&C::Handle) -> Result<R, E>,
    {
        let guard = self.scoped()?;
        f(&guard)
    }

    /// Drops every free handle and returns how many were dropped.
    ///
    /// Handles currently lent out are untouched; once released they return
    /// to the (now empty) free list as usual.
    pub fn close_all(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        let closed = state.free.len();
        state.free.clear();
        info!(closed, "closed free handles");
        closed
    }

    pub fn free_count(&self) -> usize {
        self.state.lock().unwrap().free.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.state.lock().unwrap().in_use.len()
    }

    /// `free + in_use`.
    pub fn current_size(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.free.len() + state.in_use.len()
    }
}

/// A lent handle that goes back to its pool on drop.
pub struct PooledHandle<C: Connector> {
    pool: Arc<ConnectionPool<C>>,
    handle: Option<Arc<C::Handle>>,
}

impl<C: Connector> PooledHandle<C> {
    pub fn handle(&self) -> &Arc<C::Handle> {
        // Only `release` and `drop` take the handle out, and both end the guard.
        self.handle.as_ref().unwrap_or_else(|| unreachable!("pooled handle already released"))
    }

    /// Releases now instead of at scope end, surfacing release errors.
    pub fn release(mut self) -> PoolResult<()> {
        match self.handle.take() {
            Some(handle) => self.pool.release(handle),
            None => Ok(()),
        }
    }
}

impl<C: Connector> Deref for PooledHandle<C> {
    type Target = C::Handle;

    fn deref(&self) -> &Self::Target {
        self.handle()
    }
}

impl<C: Connector> Drop for PooledHandle<C> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.pool.release(handle) {
                warn!(error = %e, "failed to return handle to pool");
            }
        }
    }
}

impl<C: Connector> EntityHandle for PooledHandle<C> {
    fn find(&self, entity_type: &str, query: &FindQuery) -> GridResult<Vec<Entity>> {
        self.handle().find(entity_type, query)
    }

    fn find_one(&self, entity_type: &str, query: &FindQuery) -> GridResult<Option<Entity>> {
        self.handle().find_one(entity_type, query)
    }

    fn create(&self, entity_type: &str, data: &Map<String, Value>) -> GridResult<Entity> {
        self.handle().create(entity_type, data)
    }

    fn update(&self, entity_type: &str, id: i64, data: &Map<String, Value>) -> GridResult<Entity> {
        self.handle().update(entity_type, id, data)
    }

    fn delete(&self, entity_type: &str, id: i64) -> GridResult<bool> {
        self.handle().delete(entity_type, id)
    }

    fn revive(&self, entity_type: &str, id: i64) -> GridResult<bool> {
        self.handle().revive(entity_type, id)
    }

    fn batch(&self, requests: &[BatchRequest]) -> GridResult<Vec<BatchOutcome>> {
        self.handle().batch(requests)
    }

    fn schema_read(&self) -> GridResult<Value> {
        self.handle().schema_read()
    }

    fn schema_entity_read(&self) -> GridResult<Value> {
        self.handle().schema_entity_read()
    }

    fn schema_field_read(&self, entity_type: &str, field: Option<&str>) -> GridResult<Value> {
        self.handle().schema_field_read(entity_type, field)
    }

    fn get_thumbnail_url(&self, entity_type: &str, id: i64, field: &str) -> GridResult<String> {
        self.handle().get_thumbnail_url(entity_type, id, field)
    }

    fn get_attachment_download_url(
        &self,
        entity_type: &str,
        id: i64,
        field: &str,
    ) -> GridResult<Option<String>> {
        self.handle().get_attachment_download_url(entity_type, id, field)
    }

    fn download_attachment(&self, attachment: &Value) -> GridResult<Vec<u8>> {
        self.handle().download_attachment(attachment)
    }
}
