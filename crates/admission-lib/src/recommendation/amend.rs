//! Amends a recommendation with override annotations

use crate::annotations::AnnotationOverrides;
use crate::error::Result;
use crate::models::{RecommendedPodResources, ResourceList};
use k8s_openapi::api::core::v1::Pod;
use tracing::{debug, trace};

/// Rewrite each recommended target with, in order of preference, the override
/// annotation, the pod's original request, or nothing (the entry is removed).
///
/// Only `target` is touched. Callers must pass their own copy of the
/// recommendation; the one held in VPA status is never amended.
pub fn amend_recommendation(
    recommendation: &mut RecommendedPodResources,
    pod: &Pod,
    overrides: &AnnotationOverrides,
) -> Result<()> {
    for container in &mut recommendation.container_recommendations {
        let name = container.container_name.as_str();
        let original_requests = original_container_requests(pod, name);
        let resources: Vec<String> = container.target.keys().cloned().collect();

        for resource in resources {
            if let Some(value) = overrides.quantity(name, &resource) {
                let value = value?;
                debug!(
                    container = %name,
                    resource = %resource,
                    value = %value,
                    "Using annotated request"
                );
                container.target.insert(resource, value.to_quantity());
                continue;
            }

            trace!(container = %name, resource = %resource, "No override annotation");
            match original_requests.and_then(|requests| requests.get(&resource)) {
                Some(original) => {
                    trace!(container = %name, resource = %resource, original = %original.0, "Keeping original request");
                    container.target.insert(resource, original.clone());
                }
                None => {
                    trace!(container = %name, resource = %resource, "Removing unset resource");
                    container.target.remove(&resource);
                }
            }
        }
    }
    Ok(())
}

/// Requests as declared in the pod spec for the named container.
///
/// This is what the pod was deployed with, not any value already applied by
/// the autoscaler.
fn original_container_requests<'a>(pod: &'a Pod, container: &str) -> Option<&'a ResourceList> {
    pod.spec
        .as_ref()?
        .containers
        .iter()
        .find(|c| c.name == container)?
        .resources
        .as_ref()?
        .requests
        .as_ref()
}
