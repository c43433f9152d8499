use thiserror::Error;

/// Errors raised by the store, the entity commands and the configuration layer.
///
/// Unknown ids on `update`/`delete` are not errors: those commands return
/// `Ok(None)` / `Ok(false)`. `NotFound` is reserved for commands that have no
/// other way to report a missing record.
#[derive(Debug, Error)]
pub enum CrmError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid subscription transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Subscription {id} already has the maximum of {max} team members")]
    TeamFull { id: String, max: u32 },

    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CrmError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CrmError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrmError>;
