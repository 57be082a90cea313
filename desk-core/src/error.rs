use thiserror::Error;

pub type Result<T> = std::result::Result<T, RoutingError>;

/// Failure taxonomy for the routing core.
///
/// Only `Durability` propagates out of message ingest; every other kind is
/// contained where it happens and recorded through tracing.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("durability failure: {0}")]
    Durability(String),

    #[error("delivery failure: {0}")]
    Delivery(String),

    #[error("enrichment failure: {0}")]
    Enrichment(String),

    #[error("configuration failure: {0}")]
    Configuration(String),

    #[error("validation failure: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl RoutingError {
    pub fn durability(e: impl std::fmt::Display) -> Self {
        Self::Durability(e.to_string())
    }

    pub fn enrichment(e: impl std::fmt::Display) -> Self {
        Self::Enrichment(e.to_string())
    }
}
