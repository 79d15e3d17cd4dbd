//! Container resource policy lookup

use crate::models::{ContainerControlledValues, ContainerResourcePolicy, PodResourcePolicy};

/// Container name that applies a policy to every container without its own entry
pub const DEFAULT_CONTAINER_POLICY: &str = "*";

/// Policy for a container: its own entry if present, else the `*` entry
pub fn container_policy<'a>(
    container: &str,
    policy: Option<&'a PodResourcePolicy>,
) -> Option<&'a ContainerResourcePolicy> {
    let policies = &policy?.container_policies;
    policies
        .iter()
        .find(|p| p.container_name == container)
        .or_else(|| {
            policies
                .iter()
                .find(|p| p.container_name == DEFAULT_CONTAINER_POLICY)
        })
}

/// Controlled values for a container, `RequestsAndLimits` when nothing says otherwise
pub fn controlled_values_for(
    container: &str,
    policy: Option<&PodResourcePolicy>,
) -> ContainerControlledValues {
    container_policy(container, policy)
        .and_then(|p| p.controlled_values)
        .unwrap_or_default()
}
