use gatehouse_core::GatehouseError;
use gatehouse_db::DbError;

/// Failures that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Store(#[from] GatehouseError),

    #[error("Signal handling failed: {0}")]
    Signal(#[from] std::io::Error),
}
