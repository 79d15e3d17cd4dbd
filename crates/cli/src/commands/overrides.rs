//! Show the override annotations carried by a VPA

use admission_lib::annotations::{gate_annotations, override_key};
use admission_lib::AnnotationOverrides;
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tabled::Tabled;

use crate::manifest::load_vpa;
use crate::output::{print_info, print_json, print_table, print_warning, OutputFormat};

#[derive(Tabled, Serialize)]
struct OverrideRow {
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Parsed")]
    parsed: String,
}

#[derive(Serialize)]
struct OverridesOutput<'a> {
    auto: bool,
    applies: bool,
    gate: BTreeMap<&'static str, &'a str>,
    overrides: Vec<OverrideRow>,
}

pub fn show_overrides(vpa_path: &Path, format: OutputFormat) -> Result<()> {
    let vpa = load_vpa(vpa_path)?;
    let empty = BTreeMap::new();
    let annotations = vpa.annotations().unwrap_or(&empty);
    let overrides = AnnotationOverrides::resolve(annotations);

    let rows: Vec<OverrideRow> = overrides
        .containers()
        .iter()
        .flat_map(|(container, resources)| {
            resources.iter().map(move |(resource, value)| (container, resource, value))
        })
        .map(|(container, resource, value)| OverrideRow {
            container: container.clone(),
            resource: resource.clone(),
            value: value.clone(),
            parsed: match overrides.quantity(container, resource) {
                Some(Ok(quantity)) => quantity.to_string(),
                Some(Err(e)) => format!("invalid: {}", e),
                None => "-".to_string(),
            },
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&OverridesOutput {
            auto: overrides.is_auto(),
            applies: overrides.should_amend(),
            gate: gate_annotations(annotations),
            overrides: rows,
        }),
        OutputFormat::Table => {
            if overrides.is_auto() {
                print_warning("Gate annotations are set to auto; overrides are ignored");
            }
            print_info(&format!(
                "Override annotations ({})",
                override_key("<container>", "<resource>")
            ));
            print_table(&rows);
            Ok(())
        }
    }
}
