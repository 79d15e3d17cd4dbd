//! Error types for resource resolution

use crate::models::ContainerToAnnotationsMap;
use crate::quantity::QuantityError;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a whole resolution call; there is no partial per-container result
#[derive(Debug, Error)]
pub enum Error {
    /// A quantity stored in the pod, VPA or limit range could not be parsed
    #[error("invalid {resource} quantity for container {container}: {source}")]
    InvalidQuantity {
        container: String,
        resource: String,
        #[source]
        source: QuantityError,
    },

    /// An override annotation carried a malformed quantity
    #[error("invalid recommendation override {key}={value:?}: {source}")]
    InvalidOverride {
        key: String,
        value: String,
        #[source]
        source: QuantityError,
    },

    #[error("error getting containerLimitRange: {0}")]
    LimitRange(#[source] BoxError),

    /// Recommendation post-processing failed; annotations produced so far are kept
    #[error("cannot process recommendation: {source}")]
    Processing {
        #[source]
        source: BoxError,
        annotations: ContainerToAnnotationsMap,
    },
}

impl Error {
    /// Annotations that were produced before the failure, if any
    pub fn annotations(&self) -> Option<&ContainerToAnnotationsMap> {
        match self {
            Error::Processing { annotations, .. } => Some(annotations),
            _ => None,
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidQuantity { .. } => "invalid_quantity",
            Error::InvalidOverride { .. } => "invalid_override",
            Error::LimitRange(_) => "limit_range",
            Error::Processing { .. } => "processing",
        }
    }
}
