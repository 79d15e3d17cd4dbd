//! Loading Kubernetes manifests from JSON files

use admission_lib::VerticalPodAutoscaler;
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{LimitRange, Pod};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} from {}", what, path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} in {}", what, path.display()))
}

pub fn load_pod(path: &Path) -> Result<Pod> {
    read_json(path, "pod")
}

pub fn load_vpa(path: &Path) -> Result<VerticalPodAutoscaler> {
    read_json(path, "VerticalPodAutoscaler")
}

/// Either a single LimitRange or a JSON array of them
#[derive(Deserialize)]
#[serde(untagged)]
enum LimitRanges {
    Many(Vec<LimitRange>),
    One(Box<LimitRange>),
}

pub fn load_limit_ranges(path: &Path) -> Result<Vec<LimitRange>> {
    Ok(match read_json(path, "limit ranges")? {
        LimitRanges::Many(ranges) => ranges,
        LimitRanges::One(range) => vec![*range],
    })
}
