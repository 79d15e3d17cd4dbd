//! VPA admission controller service
//!
//! Serves resource resolution over HTTP alongside health and metrics endpoints.

pub mod api;
pub mod config;
