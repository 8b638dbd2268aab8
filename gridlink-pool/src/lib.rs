//! Authenticated connection pool and live handle for gridlink.
//!
//! - [`ConnectionPool`] lends out handles built by a [`Connector`], reusing an
//!   existing session token before falling back to a full login
//! - [`PooledHandle`] returns its handle to the pool on every exit path
//! - [`RemoteClient`] is the live [`gridlink_model::EntityHandle`] over the
//!   service's JSON RPC endpoint, built by [`HttpConnector`]
//! - [`RemoteFactory`] is the live side of [`gridlink_model::HandleFactory`]

mod config;
mod error;
mod factory;
mod pool;
mod remote;

pub use config::{

    Credentials, ENV_CA_CERTS, ENV_HTTP_PROXY, ENV_MAX_RPC_ATTEMPTS, ENV_POOL_MAX_SIZE,

    ENV_RPC_ATTEMPT_INTERVAL, ENV_SCRIPT_KEY, ENV_SCRIPT_NAME, ENV_TIMEOUT_SECS, ENV_URL,

    PoolConfig, ReliabilityConfig,

};
pub use error::{PoolError, PoolResult};
pub use factory::RemoteFactory;
pub use pool::{ConnectionPool, Connector, PooledHandle, SessionHandle};
pub use remote::{ENTITIES_PER_PAGE, HttpConnector, RemoteClient};
