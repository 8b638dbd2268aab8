//! Live handle factory backed by a connection pool.

use crate::config::PoolConfig;
use crate::pool::{ConnectionPool, Connector};
use crate::remote::HttpConnector;
use gridlink_model::{EntityHandle, GridResult, HandleFactory};
use std::sync::Arc;

/// Hands out pooled handles. Each client returns to the pool when dropped.
pub struct RemoteFactory<C: Connector> {
    pool: Arc<ConnectionPool<C>>,
}

impl<C: Connector> Clone for RemoteFactory<C> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<C: Connector> RemoteFactory<C> {
    pub fn new(pool: Arc<ConnectionPool<C>>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool<C>> {
        &self.pool
    }
}

impl RemoteFactory<HttpConnector> {
    /// A factory over a fresh HTTP-backed pool sized and tuned by `config`.
    pub fn from_config(config: PoolConfig) -> Self {
        let max_size = config.max_size;
        let reliability = config.reliability.clone();
        let pool = ConnectionPool::new(HttpConnector::new(config), max_size, reliability);
        Self::new(Arc::new(pool))
    }
}

impl<C: Connector + 'static> HandleFactory for RemoteFactory<C> {
    fn create_client(&self) -> GridResult<Box<dyn EntityHandle>> {
        Ok(Box::new(self.pool.scoped()?))
    }
}
