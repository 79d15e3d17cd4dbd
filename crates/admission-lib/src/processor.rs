//! Recommendation post-processing applied before resources are resolved

use crate::models::{
    append_annotations, ContainerToAnnotationsMap, PodResourcePolicy, RecommendedPodResources,
    VerticalPodAutoscalerCondition,
};
use crate::policy::container_policy;
use crate::quantity::ParsedQuantity;
use anyhow::{anyhow, Context};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::cmp::Ordering;

/// Output of a successful post-processing pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedRecommendation {
    pub recommendation: RecommendedPodResources,
    pub annotations: ContainerToAnnotationsMap,
}

/// A failed pass; annotations gathered before the failure are still reported
#[derive(Debug)]
pub struct ProcessingFailure {
    pub reason: anyhow::Error,
    pub annotations: ContainerToAnnotationsMap,
}

/// Trait for recommendation post-processors.
///
/// Receives an owned recommendation that no other call can observe.
pub trait RecommendationProcessor: Send + Sync {
    fn apply(
        &self,
        recommendation: RecommendedPodResources,
        policy: Option<&PodResourcePolicy>,
        conditions: &[VerticalPodAutoscalerCondition],
        pod: &Pod,
    ) -> Result<ProcessedRecommendation, ProcessingFailure>;
}

/// Returns the recommendation unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughProcessor;

impl RecommendationProcessor for PassThroughProcessor {
    fn apply(
        &self,
        recommendation: RecommendedPodResources,
        _policy: Option<&PodResourcePolicy>,
        _conditions: &[VerticalPodAutoscalerCondition],
        _pod: &Pod,
    ) -> Result<ProcessedRecommendation, ProcessingFailure> {
        Ok(ProcessedRecommendation {
            recommendation,
            annotations: ContainerToAnnotationsMap::new(),
        })
    }
}

/// Clamps targets into the container policy's `minAllowed`/`maxAllowed`
#[derive(Debug, Clone, Copy, Default)]
pub struct CappingProcessor;

impl RecommendationProcessor for CappingProcessor {
    fn apply(
        &self,
        mut recommendation: RecommendedPodResources,
        policy: Option<&PodResourcePolicy>,
        _conditions: &[VerticalPodAutoscalerCondition],
        _pod: &Pod,
    ) -> Result<ProcessedRecommendation, ProcessingFailure> {
        let mut annotations = ContainerToAnnotationsMap::new();

        for container in &mut recommendation.container_recommendations {
            let Some(container_policy) = container_policy(&container.container_name, policy) else {
                continue;
            };
            let controlled = container_policy.controlled_resources.as_deref();
            let mut notes = Vec::new();

            for (resource, target) in container.target.iter_mut() {
                if controlled.is_some_and(|names| !names.contains(resource)) {
                    continue;
                }
                let bounds = [
                    (container_policy.min_allowed.as_ref(), Ordering::Less, "minAllowed"),
                    (container_policy.max_allowed.as_ref(), Ordering::Greater, "maxAllowed"),
                ];
                for (allowed, violation, label) in bounds {
                    let Some(bound) = allowed.and_then(|list| list.get(resource)) else {
                        continue;
                    };
                    match exceeds(target, bound, violation) {
                        Ok(true) => {
                            *target = bound.clone();
                            notes.push(format!("{resource} capped to {label}"));
                        }
                        Ok(false) => {}
                        Err(reason) => {
                            append_annotations(&mut annotations, &container.container_name, notes);
                            return Err(ProcessingFailure {
                                reason: reason.context(format!(
                                    "capping {resource} for container {}",
                                    container.container_name
                                )),
                                annotations,
                            });
                        }
                    }
                }
            }
            append_annotations(&mut annotations, &container.container_name, notes);
        }

        Ok(ProcessedRecommendation {
            recommendation,
            annotations,
        })
    }
}

fn exceeds(target: &Quantity, bound: &Quantity, violation: Ordering) -> anyhow::Result<bool> {
    let target = ParsedQuantity::from_quantity(target).context("invalid recommendation target")?;
    let bound = ParsedQuantity::from_quantity(bound)
        .map_err(|e| anyhow!("invalid policy bound {:?}: {e}", bound.0))?;
    Ok(target.cmp(&bound) == violation)
}
