//! VPA resources CLI
//!
//! Resolves, offline, the requests and limits the VPA admission webhook would
//! inject into a pod, and inspects VPA override annotations.

mod commands;
mod manifest;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{compute, overrides};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// VPA resources CLI
#[derive(Parser)]
#[command(name = "vpa-resources")]
#[command(author, version, about = "Inspect VPA admission resource resolution", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, env = "VPA_RESOURCES_FORMAT", default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute the resources injected into a pod
    Compute {
        /// Pod manifest (JSON)
        #[arg(long)]
        pod: PathBuf,

        /// VerticalPodAutoscaler manifest (JSON)
        #[arg(long)]
        vpa: PathBuf,

        /// LimitRange manifest or list of them (JSON)
        #[arg(long, env = "VPA_RESOURCES_LIMIT_RANGE")]
        limit_range: Option<PathBuf>,

        /// Use declared requests for containers without a recommendation
        #[arg(long)]
        include_unmatched: bool,

        /// Skip clamping to the VPA's minAllowed/maxAllowed
        #[arg(long)]
        no_policy_cap: bool,
    },

    /// Show the override annotations on a VPA
    Overrides {
        /// VerticalPodAutoscaler manifest (JSON)
        #[arg(long)]
        vpa: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .compact()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .init();
    }

    match cli.command {
        Commands::Compute {
            pod,
            vpa,
            limit_range,
            include_unmatched,
            no_policy_cap,
        } => compute::compute(
            compute::ComputeArgs {
                pod: &pod,
                vpa: &vpa,
                limit_range: limit_range.as_deref(),
                include_unmatched,
                cap_to_policy: !no_policy_cap,
            },
            cli.format,
        ),
        Commands::Overrides { vpa } => overrides::show_overrides(&vpa, cli.format),
    }
}
