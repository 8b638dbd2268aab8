//! Error types for pool and remote-handle operations.

use gridlink_model::GridError;
use thiserror::Error;

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors raised while building, lending or driving remote handles.
#[derive(Debug, Error)]
pub enum PoolError {
    /// At capacity with no free handle.
    #[error("connection pool exhausted (max {max_size} handles)")]
    Exhausted { max_size: usize },

    /// Released a handle the pool is not lending out.
    #[error("handle is not in use by this pool")]
    NotInUse,

    /// Credential or session failure while constructing a handle.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport failure talking to the service.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an exception payload.
    #[error("remote error: {0}")]
    Remote(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<PoolError> for GridError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Exhausted { max_size } => GridError::PoolExhausted { max_size },
            PoolError::NotInUse => GridError::NotInUse,
            PoolError::Authentication(msg) => GridError::Authentication(msg),
            PoolError::Serialization(e) => GridError::Serialization(e),
            PoolError::Remote(msg) => GridError::Remote(msg),
            other @ (PoolError::Config(_) | PoolError::Http(_)) => {
                GridError::Remote(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_errors_map_onto_grid_taxonomy() {
        assert!(matches!(
            GridError::from(PoolError::Exhausted { max_size: 2 }),
            GridError::PoolExhausted { max_size: 2 }
        ));
        assert!(matches!(GridError::from(PoolError::NotInUse), GridError::NotInUse));
        assert!(matches!(
            GridError::from(PoolError::Authentication("bad key".into())),
            GridError::Authentication(msg) if msg == "bad key"
        ));
        let config = GridError::from(PoolError::Config("SHOTGRID_URL".into()));
        assert!(config.to_string().contains("SHOTGRID_URL"));
    }
}
