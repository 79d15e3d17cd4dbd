//! Per-container request selection and limit derivation

use crate::error::Result;
use crate::limits::{proportional_limits, NamespaceLimits};
use crate::models::{
    append_annotations, ContainerControlledValues, ContainerResources, ContainerToAnnotationsMap,
    PodResourcePolicy, RecommendedPodResources, ResourceList,
};
use crate::policy::controlled_values_for;
use k8s_openapi::api::core::v1::{LimitRangeItem, Pod};
use tracing::debug;

/// Resources for each container of the pod, in pod spec order.
///
/// Containers without a recommendation are left empty unless
/// `include_unmatched` is set, in which case their declared requests are used.
/// Limit notes are appended to `annotations` under the container name.
pub fn get_containers_resources(
    pod: &Pod,
    policy: Option<&PodResourcePolicy>,
    recommendation: &RecommendedPodResources,
    limit_range: Option<&LimitRangeItem>,
    include_unmatched: bool,
    annotations: &mut ContainerToAnnotationsMap,
) -> Result<Vec<ContainerResources>> {
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.as_slice())
        .unwrap_or_default();
    let namespace_limits = NamespaceLimits::from_item(limit_range);
    let empty = ResourceList::new();

    let mut resources = Vec::with_capacity(containers.len());
    for container in containers {
        let declared = container.resources.as_ref();
        let original_requests = declared.and_then(|r| r.requests.as_ref()).unwrap_or(&empty);
        let original_limits = declared.and_then(|r| r.limits.as_ref()).unwrap_or(&empty);

        let requests = match recommendation.for_container(&container.name) {
            Some(rec) => Some(rec.target.clone()),
            None if include_unmatched => {
                debug!(container = %container.name, "No matching recommendation, using pod request");
                declared.and_then(|r| r.requests.clone())
            }
            None => {
                debug!(container = %container.name, "No matching recommendation, skipping");
                resources.push(ContainerResources::default());
                continue;
            }
        };

        let mut limits = None;
        if controlled_values_for(&container.name, policy)
            == ContainerControlledValues::RequestsAndLimits
        {
            let derived = proportional_limits(
                &container.name,
                original_limits,
                original_requests,
                requests.as_ref().unwrap_or(&empty),
                &namespace_limits,
            )?;
            if derived.limits.is_some() {
                limits = derived.limits;
                append_annotations(annotations, &container.name, derived.notes);
            }
        }

        resources.push(ContainerResources { requests, limits });
    }
    Ok(resources)
}
