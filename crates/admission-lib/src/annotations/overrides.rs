//! Per-container override annotations: `<container>.recommendations.com/{cpu|memory}`

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// The container segment is looser than valid container names.
pub const RECOMMENDATION_ANNOTATION_PATTERN: &str =
    r"^([a-z0-9-]+)\.recommendations\.com/(cpu|memory)$";

/// Container name to resource name to raw override value
pub type ResourceOverrides = BTreeMap<String, BTreeMap<String, String>>;

fn recommendation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(RECOMMENDATION_ANNOTATION_PATTERN)
            .expect("recommendation annotation pattern must compile")
    })
}

/// Annotation key overriding `resource` for `container`
pub fn override_key(container: &str, resource: &str) -> String {
    format!("{container}.recommendations.com/{resource}")
}

/// Collect every override annotation by container and resource
pub fn resource_request_overrides(annotations: &BTreeMap<String, String>) -> ResourceOverrides {
    let re = recommendation_regex();
    let mut requested = ResourceOverrides::new();

    for (key, value) in annotations {
        let Some(captures) = re.captures(key) else {
            continue;
        };
        requested
            .entry(captures[1].to_string())
            .or_default()
            .insert(captures[2].to_string(), value.clone());
    }
    requested
}

/// True if at least one override annotation is present
pub fn has_recommendation_annotations(annotations: &BTreeMap<String, String>) -> bool {
    let re = recommendation_regex();
    annotations.keys().any(|key| re.is_match(key))
}
