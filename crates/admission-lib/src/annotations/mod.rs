//! Operator-supplied recommendation override annotations
//!
//! Two annotation dialects are recognised on the VPA object:
//! - pod-wide gate keys (`recommendations.cloudnatix.com/{cpu,memory}`), which
//!   when both set to `auto` leave the recommendation untouched
//! - per-container keys (`<container>.recommendations.com/{cpu,memory}`) whose
//!   values replace the recommended request for that container

mod gate;
mod overrides;

pub use gate::{
    gate_annotations, has_gate_annotations, is_auto_gate, AUTO, GATE_CPU_ANNOTATION,
    GATE_MEMORY_ANNOTATION,
};
pub use overrides::{
    has_recommendation_annotations, override_key, resource_request_overrides, ResourceOverrides,
    RECOMMENDATION_ANNOTATION_PATTERN,
};

use crate::error::{Error, Result};
use crate::quantity::ParsedQuantity;
use std::collections::BTreeMap;

/// Classified view of a VPA's override annotations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationOverrides {
    auto_gate: bool,
    per_container: ResourceOverrides,
}

impl AnnotationOverrides {
    /// Gate keys first, then the per-container pattern
    pub fn resolve(annotations: &BTreeMap<String, String>) -> Self {
        Self {
            auto_gate: is_auto_gate(annotations),
            per_container: resource_request_overrides(annotations),
        }
    }

    pub fn is_auto(&self) -> bool {
        self.auto_gate
    }

    pub fn is_empty(&self) -> bool {
        self.per_container.is_empty()
    }

    /// Whether the recommendation needs amending before use
    pub fn should_amend(&self) -> bool {
        !self.auto_gate && !self.per_container.is_empty()
    }

    pub fn containers(&self) -> &ResourceOverrides {
        &self.per_container
    }

    /// Parsed override for a container resource.
    ///
    /// A malformed value is an error rather than a skipped override.
    pub fn quantity(&self, container: &str, resource: &str) -> Option<Result<ParsedQuantity>> {
        let value = self.per_container.get(container)?.get(resource)?;
        Some(value.parse().map_err(|source| Error::InvalidOverride {
            key: override_key(container, resource),
            value: value.clone(),
            source,
        }))
    }
}
