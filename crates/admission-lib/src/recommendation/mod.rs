//! Recommendation provider for the admission path
//!
//! Merges the VPA recommendation, override annotations and the namespace
//! limit range into the requests and limits injected into a pod:
//! - override annotations amend a private copy of the recommendation
//! - post-processing runs on that copy
//! - requests are chosen per container and limits rescaled proportionally

mod amend;
mod resolve;

#[cfg(test)]
mod tests;

pub use amend::amend_recommendation;
pub use resolve::get_containers_resources;

use crate::annotations::AnnotationOverrides;
use crate::error::{Error, Result};
use crate::limits::LimitRangeCalculator;
use crate::models::{
    ContainerResources, ContainerToAnnotationsMap, RecommendedPodResources, UpdateMode,
    VerticalPodAutoscaler,
};
use crate::processor::RecommendationProcessor;
use k8s_openapi::api::core::v1::Pod;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Namespace assumed for pods that do not carry one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Resolved resources for one pod
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PodResources {
    /// One entry per container, aligned with the pod spec
    pub containers: Vec<ContainerResources>,
    pub annotations: ContainerToAnnotationsMap,
    /// How many of `annotations` were added while deriving limits
    #[serde(skip)]
    pub limit_notes: usize,
}

/// Trait for computing the resources to inject into a pod
pub trait Provider: Send + Sync {
    /// `Ok(None)` when either input is missing, which is not an error.
    fn get_containers_resources_for_pod(
        &self,
        pod: Option<&Pod>,
        vpa: Option<&VerticalPodAutoscaler>,
    ) -> Result<Option<PodResources>>;
}

/// Provider backed by a limit-range source and a recommendation processor
#[derive(Clone)]
pub struct RecommendationProvider {
    limit_ranges: Arc<dyn LimitRangeCalculator>,
    processor: Arc<dyn RecommendationProcessor>,
    include_unmatched: bool,
}

impl RecommendationProvider {
    pub fn new(
        limit_ranges: Arc<dyn LimitRangeCalculator>,
        processor: Arc<dyn RecommendationProcessor>,
    ) -> Self {
        Self {
            limit_ranges,
            processor,
            include_unmatched: false,
        }
    }

    /// Fall back to declared requests for containers without a recommendation
    pub fn with_include_unmatched(mut self, include_unmatched: bool) -> Self {
        self.include_unmatched = include_unmatched;
        self
    }
}

impl Provider for RecommendationProvider {
    fn get_containers_resources_for_pod(
        &self,
        pod: Option<&Pod>,
        vpa: Option<&VerticalPodAutoscaler>,
    ) -> Result<Option<PodResources>> {
        let (Some(pod), Some(vpa)) = (pod, vpa) else {
            debug!(
                has_pod = pod.is_some(),
                has_vpa = vpa.is_some(),
                "Cannot calculate recommendations without both pod and vpa"
            );
            return Ok(None);
        };
        let pod_name = pod.metadata.name.as_deref().unwrap_or_default();
        debug!(pod = %pod_name, "Updating requirements for pod");

        let mut annotations = ContainerToAnnotationsMap::new();
        let mut recommended = RecommendedPodResources::default();

        if let Some(status_recommendation) = vpa.recommendation() {
            let mut copied = status_recommendation.clone();
            let empty = BTreeMap::new();
            let overrides = AnnotationOverrides::resolve(vpa.annotations().unwrap_or(&empty));
            if overrides.should_amend() {
                amend_recommendation(&mut copied, pod, &overrides)?;
            }

            match self.processor.apply(
                copied,
                vpa.spec.resource_policy.as_ref(),
                vpa.conditions(),
                pod,
            ) {
                Ok(processed) => {
                    recommended = processed.recommendation;
                    annotations = processed.annotations;
                }
                Err(failure) => {
                    debug!(pod = %pod_name, "Cannot process recommendation for pod");
                    return Err(Error::Processing {
                        source: failure.reason.into(),
                        annotations: failure.annotations,
                    });
                }
            }
        }

        let namespace = pod.metadata.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
        let limit_range = self
            .limit_ranges
            .container_limit_range_item(namespace)
            .map_err(|e| Error::LimitRange(e.into()))?;

        let resource_policy = match vpa.update_mode() {
            Some(UpdateMode::Off) => None,
            _ => vpa.spec.resource_policy.as_ref(),
        };

        let processor_notes = note_count(&annotations);
        let containers = get_containers_resources(
            pod,
            resource_policy,
            &recommended,
            limit_range.as_ref(),
            self.include_unmatched,
            &mut annotations,
        )?;

        let limit_notes = note_count(&annotations) - processor_notes;

        Ok(Some(PodResources {
            containers,
            annotations,
            limit_notes,
        }))
    }
}

fn note_count(annotations: &ContainerToAnnotationsMap) -> usize {
    annotations.values().map(Vec::len).sum()
}
