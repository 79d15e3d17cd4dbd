//! Namespace limit-range lookup

use crate::models::ResourceList;
use crate::quantity::ParsedQuantity;
use crate::recommendation::DEFAULT_NAMESPACE;
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{LimitRange, LimitRangeItem};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// `LimitRangeItem.type` for per-container constraints
pub const LIMIT_TYPE_CONTAINER: &str = "Container";

/// Source of namespace container limit ranges
pub trait LimitRangeCalculator: Send + Sync {
    /// Effective container limit range for a namespace, `None` if there is none
    fn container_limit_range_item(&self, namespace: &str) -> Result<Option<LimitRangeItem>>;
}

/// Calculator for clusters without limit ranges
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLimitRangeCalculator;

impl LimitRangeCalculator for NoopLimitRangeCalculator {
    fn container_limit_range_item(&self, _namespace: &str) -> Result<Option<LimitRangeItem>> {
        Ok(None)
    }
}

/// Read-only table of limit ranges keyed by namespace
#[derive(Debug, Clone, Default)]
pub struct StaticLimitRangeCalculator {
    by_namespace: HashMap<String, Vec<LimitRangeItem>>,
}

impl StaticLimitRangeCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index limit ranges by their metadata namespace
    pub fn from_limit_ranges(ranges: impl IntoIterator<Item = LimitRange>) -> Self {
        let mut calculator = Self::new();
        for range in ranges {
            let namespace = range
                .metadata
                .namespace
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
            for item in range.spec.map(|spec| spec.limits).unwrap_or_default() {
                calculator.insert(&namespace, item);
            }
        }
        calculator
    }

    /// Load a JSON array of `LimitRange` objects
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read limit ranges from {}", path.display()))?;
        let ranges: Vec<LimitRange> =
            serde_json::from_str(&content).context("Failed to parse limit ranges")?;
        Ok(Self::from_limit_ranges(ranges))
    }

    pub fn insert(&mut self, namespace: &str, item: LimitRangeItem) {
        self.by_namespace
            .entry(namespace.to_string())
            .or_default()
            .push(item);
    }

    pub fn namespace_count(&self) -> usize {
        self.by_namespace.len()
    }
}

impl LimitRangeCalculator for StaticLimitRangeCalculator {
    /// Merges every container item of the namespace: the last default wins,
    /// the lowest max and the highest min per resource are kept.
    fn container_limit_range_item(&self, namespace: &str) -> Result<Option<LimitRangeItem>> {
        let Some(items) = self.by_namespace.get(namespace) else {
            return Ok(None);
        };

        let mut merged = LimitRangeItem {
            type_: LIMIT_TYPE_CONTAINER.to_string(),
            ..Default::default()
        };
        for item in items.iter().filter(|item| item.type_ == LIMIT_TYPE_CONTAINER) {
            if item.default.is_some() {
                merged.default = item.default.clone();
            }
            if let Some(max) = &item.max {
                merge_bound(&mut merged.max, max, Ordering::Less)?;
            }
            if let Some(min) = &item.min {
                merge_bound(&mut merged.min, min, Ordering::Greater)?;
            }
        }

        if merged.default.is_none() && merged.max.is_none() && merged.min.is_none() {
            return Ok(None);
        }
        debug!(namespace = %namespace, "Resolved container limit range");
        Ok(Some(merged))
    }
}

/// Keep, per resource, whichever bound compares as `prefer` against the current one
fn merge_bound(current: &mut Option<ResourceList>, incoming: &ResourceList, prefer: Ordering) -> Result<()> {
    let current = current.get_or_insert_with(ResourceList::new);
    for (resource, quantity) in incoming {
        let candidate = ParsedQuantity::from_quantity(quantity)
            .with_context(|| format!("invalid {resource} bound {:?}", quantity.0))?;
        let replace = match current.get(resource) {
            Some(existing) => {
                let existing = ParsedQuantity::from_quantity(existing)
                    .with_context(|| format!("invalid {resource} bound {:?}", existing.0))?;
                candidate.cmp(&existing) == prefer
            }
            None => true,
        };
        if replace {
            current.insert(resource.clone(), quantity.clone());
        }
    }
    Ok(())
}
