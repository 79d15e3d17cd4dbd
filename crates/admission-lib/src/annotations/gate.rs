//! Pod-wide gate annotations that hand control back to default autoscaler behaviour

use crate::models::{RESOURCE_CPU, RESOURCE_MEMORY};
use std::collections::BTreeMap;

pub const GATE_CPU_ANNOTATION: &str = "recommendations.cloudnatix.com/cpu";
pub const GATE_MEMORY_ANNOTATION: &str = "recommendations.cloudnatix.com/memory";

/// Sentinel value meaning "use the recommendation unchanged"
pub const AUTO: &str = "auto";

/// Gate values by resource name, only for keys that are present
pub fn gate_annotations(annotations: &BTreeMap<String, String>) -> BTreeMap<&'static str, &str> {
    [
        (RESOURCE_CPU, GATE_CPU_ANNOTATION),
        (RESOURCE_MEMORY, GATE_MEMORY_ANNOTATION),
    ]
    .into_iter()
    .filter_map(|(resource, key)| Some((resource, annotations.get(key)?.as_str())))
    .collect()
}

/// True if either gate key is set
pub fn has_gate_annotations(annotations: &BTreeMap<String, String>) -> bool {
    annotations.contains_key(GATE_CPU_ANNOTATION) || annotations.contains_key(GATE_MEMORY_ANNOTATION)
}

/// True only when both gates are set to `auto`
pub fn is_auto_gate(annotations: &BTreeMap<String, String>) -> bool {
    let gates = gate_annotations(annotations);
    [RESOURCE_CPU, RESOURCE_MEMORY].iter().all(|resource| {
        gates
            .get(resource)
            .is_some_and(|value| value.eq_ignore_ascii_case(AUTO))
    })
}
