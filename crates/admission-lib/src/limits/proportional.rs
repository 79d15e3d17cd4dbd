//! Proportional limit derivation
//!
//! When a request changes, the limit is rescaled so the original
//! limit-to-request ratio (the burst headroom) is preserved. A container
//! without its own limit falls back to the namespace default limit.

use crate::error::{Error, Result};
use crate::models::{ResourceList, RESOURCE_MEMORY};
use crate::quantity::{ParsedQuantity, QuantityFormat};
use k8s_openapi::api::core::v1::LimitRangeItem;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// Namespace-level constraints that shape derived limits
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceLimits {
    pub default: ResourceList,
    pub min: ResourceList,
    pub max: ResourceList,
}

impl NamespaceLimits {
    /// Empty constraints when the namespace has no container limit range
    pub fn from_item(item: Option<&LimitRangeItem>) -> Self {
        let Some(item) = item else {
            return Self::default();
        };
        Self {
            default: item.default.clone().unwrap_or_default(),
            min: item.min.clone().unwrap_or_default(),
            max: item.max.clone().unwrap_or_default(),
        }
    }
}

/// Derived limits plus notes describing any adjustment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProportionalLimits {
    /// `None` when no resource had a baseline limit
    pub limits: Option<ResourceList>,
    pub notes: Vec<String>,
}

/// Compute limits for `new_requests` that keep each resource's original ratio.
pub fn proportional_limits(
    container: &str,
    original_limits: &ResourceList,
    original_requests: &ResourceList,
    new_requests: &ResourceList,
    namespace: &NamespaceLimits,
) -> Result<ProportionalLimits> {
    let parse = |resource: &str, quantity: &Quantity| {
        ParsedQuantity::from_quantity(quantity).map_err(|source| Error::InvalidQuantity {
            container: container.to_string(),
            resource: resource.to_string(),
            source,
        })
    };
    let parse_non_zero = |resource: &str, quantity: Option<&Quantity>| -> Result<Option<ParsedQuantity>> {
        match quantity {
            Some(q) => Ok(Some(parse(resource, q)?).filter(|q| !q.is_zero())),
            None => Ok(None),
        }
    };

    let mut limits = ResourceList::new();
    let mut notes = Vec::new();

    for (resource, request) in new_requests {
        let new_request = parse(resource, request)?;
        if new_request.is_zero() {
            continue;
        }

        let mut base = None;
        for candidate in [original_limits.get(resource), namespace.default.get(resource)]
            .into_iter()
            .flatten()
        {
            let parsed = parse(resource, candidate)?;
            if !parsed.is_zero() {
                base = Some((parsed, candidate));
                break;
            }
        }
        let Some((base_limit, base_quantity)) = base else {
            continue;
        };

        // An unscaled limit is emitted exactly as written.
        let base_request = parse_non_zero(resource, original_requests.get(resource))?;
        let (mut scaled, mut value) = match base_request {
            Some(base_request) if base_request != new_request => {
                let ceiling = int64_ceiling(resource);
                match base_limit
                    .scale(&new_request, &base_request)
                    .filter(|scaled| scaled.milli_value() <= ceiling)
                {
                    Some(scaled) => (scaled, scaled.to_quantity()),
                    None => {
                        notes.push(format!(
                            "{resource}: failed to keep limit to request ratio; capping limit to int64"
                        ));
                        let capped = ParsedQuantity::from_milli(
                            ceiling.max(new_request.milli_value()),
                            QuantityFormat::DecimalSI,
                        );
                        (capped, capped.to_quantity())
                    }
                }
            }
            _ => (base_limit, base_quantity.clone()),
        };

        if let Some(max) = namespace.max.get(resource) {
            if scaled > parse(resource, max)? {
                notes.push(format!(
                    "{resource} limit capped to namespace maximum for {container}"
                ));
                scaled = parse(resource, max)?;
                value = max.clone();
            }
        }
        if let Some(min) = namespace.min.get(resource) {
            if scaled < parse(resource, min)? {
                notes.push(format!(
                    "{resource} limit capped to namespace minimum for {container}"
                ));
                value = min.clone();
            }
        }

        limits.insert(resource.clone(), value);
    }

    Ok(ProportionalLimits {
        limits: (!limits.is_empty()).then_some(limits),
        notes,
    })
}

/// Largest limit representable as an int64 in the resource's own unit, in
/// milli-units: bytes for memory, milli-units for everything else.
fn int64_ceiling(resource: &str) -> i128 {
    let max = i128::from(i64::MAX);
    if resource == RESOURCE_MEMORY {
        max * 1000
    } else {
        max
    }
}
