//! Resolve the resources the admission webhook would inject into a pod

use admission_lib::{
    CappingProcessor, LimitRangeCalculator, NoopLimitRangeCalculator, PassThroughProcessor,
    PodResources, Provider, RecommendationProcessor, RecommendationProvider,
    StaticLimitRangeCalculator, RESOURCE_CPU, RESOURCE_MEMORY,
};
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Pod;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;
use tracing::debug;

use crate::manifest::{load_limit_ranges, load_pod, load_vpa};
use crate::output::{
    format_notes, format_quantity, print_info, print_json, print_table, OutputFormat,
};

/// Row for the container resources table
#[derive(Tabled)]
struct ContainerRow {
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "CPU Req")]
    cpu_request: String,
    #[tabled(rename = "CPU Lim")]
    cpu_limit: String,
    #[tabled(rename = "Mem Req")]
    memory_request: String,
    #[tabled(rename = "Mem Lim")]
    memory_limit: String,
    #[tabled(rename = "Notes")]
    notes: String,
}

/// JSON output, with the container names the resource entries align with
#[derive(Serialize)]
struct ComputeOutput<'a> {
    pod: &'a str,
    #[serde(flatten)]
    resources: &'a PodResources,
    container_names: Vec<&'a str>,
}

pub struct ComputeArgs<'a> {
    pub pod: &'a Path,
    pub vpa: &'a Path,
    pub limit_range: Option<&'a Path>,
    pub include_unmatched: bool,
    pub cap_to_policy: bool,
}

pub fn compute(args: ComputeArgs<'_>, format: OutputFormat) -> Result<()> {
    let pod = load_pod(args.pod)?;
    let vpa = load_vpa(args.vpa)?;

    let limit_ranges: Arc<dyn LimitRangeCalculator> = match args.limit_range {
        Some(path) => {
            let calculator = StaticLimitRangeCalculator::from_limit_ranges(load_limit_ranges(path)?);
            debug!(namespaces = calculator.namespace_count(), "Loaded limit ranges");
            Arc::new(calculator)
        }
        None => Arc::new(NoopLimitRangeCalculator),
    };
    let processor: Arc<dyn RecommendationProcessor> = if args.cap_to_policy {
        Arc::new(CappingProcessor)
    } else {
        Arc::new(PassThroughProcessor)
    };

    let provider = RecommendationProvider::new(limit_ranges, processor)
        .with_include_unmatched(args.include_unmatched);
    let resources = provider
        .get_containers_resources_for_pod(Some(&pod), Some(&vpa))
        .context("Failed to resolve container resources")?
        .unwrap_or_default();

    let pod_name = pod.metadata.name.as_deref().unwrap_or_default();
    let names = container_names(&pod);

    match format {
        OutputFormat::Json => print_json(&ComputeOutput {
            pod: pod_name,
            resources: &resources,
            container_names: names,
        }),
        OutputFormat::Table => {
            let rows: Vec<ContainerRow> = names
                .iter()
                .zip(&resources.containers)
                .map(|(name, container)| ContainerRow {
                    container: name.to_string(),
                    cpu_request: format_quantity(container.requests.as_ref(), RESOURCE_CPU),
                    cpu_limit: format_quantity(container.limits.as_ref(), RESOURCE_CPU),
                    memory_request: format_quantity(container.requests.as_ref(), RESOURCE_MEMORY),
                    memory_limit: format_quantity(container.limits.as_ref(), RESOURCE_MEMORY),
                    notes: format_notes(resources.annotations.get(*name)),
                })
                .collect();

            print_info(&format!("Resources for pod {}", pod_name));
            print_table(&rows);
            Ok(())
        }
    }
}

fn container_names(pod: &Pod) -> Vec<&str> {
    pod.spec
        .as_ref()
        .map(|spec| spec.containers.iter().map(|c| c.name.as_str()).collect())
        .unwrap_or_default()
}
