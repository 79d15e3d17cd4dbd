//! Resource resolution for the VPA admission webhook
//!
//! This crate provides the core functionality for:
//! - Override annotations on the VPA object
//! - Amending a recommendation with overrides and original pod requests
//! - Choosing per-container requests and proportional limits
//! - Namespace limit ranges
//! - Health checks and observability

pub mod annotations;
pub mod error;
pub mod health;
pub mod limits;
pub mod models;
pub mod observability;
pub mod policy;
pub mod processor;
pub mod quantity;
pub mod recommendation;

pub use annotations::AnnotationOverrides;
pub use error::{Error, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use limits::{
    LimitRangeCalculator, NoopLimitRangeCalculator, StaticLimitRangeCalculator,
};
pub use models::*;
pub use observability::{AdmissionMetrics, StructuredLogger};
pub use processor::{CappingProcessor, PassThroughProcessor, RecommendationProcessor};
pub use quantity::ParsedQuantity;
pub use recommendation::{PodResources, Provider, RecommendationProvider};
