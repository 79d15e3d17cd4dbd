//! Admission controller configuration

use anyhow::{Context, Result};
use serde::Deserialize;

/// Admission controller configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdmissionConfig {
    /// Instance name used in structured logs
    #[serde(default = "default_instance")]
    pub instance: String,

    /// API server port for resolution, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// JSON file holding a list of LimitRange objects
    #[serde(default)]
    pub limit_ranges_path: Option<String>,

    /// Clamp recommendations to the VPA's minAllowed/maxAllowed
    #[serde(default = "default_cap_to_policy")]
    pub cap_to_policy: bool,

    /// Use declared requests for containers without a recommendation
    #[serde(default)]
    pub include_unmatched: bool,
}

fn default_instance() -> String {
    std::env::var("POD_NAME").unwrap_or_else(|_| "vpa-admission".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_cap_to_policy() -> bool {
    true
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            instance: default_instance(),
            api_port: default_api_port(),
            limit_ranges_path: None,
            cap_to_policy: default_cap_to_policy(),
            include_unmatched: false,
        }
    }
}

impl AdmissionConfig {
    /// Load configuration from `ADMISSION_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_builder(config::Config::builder())
    }

    /// Load from an existing builder with the environment layered on top
    pub fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let config = builder
            .add_source(config::Environment::with_prefix("ADMISSION").try_parsing(true))
            .build()
            .context("Failed to read admission configuration")?;

        config
            .try_deserialize()
            .context("Invalid admission configuration")
    }
}
