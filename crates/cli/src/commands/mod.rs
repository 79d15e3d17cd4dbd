//! CLI subcommands

pub mod compute;
pub mod overrides;
