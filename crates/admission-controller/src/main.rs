//! VPA admission controller
//!
//! Resolves the requests and limits the webhook injects into pods covered by a
//! VerticalPodAutoscaler.

use admission_controller::{api, config::AdmissionConfig};
use admission_lib::{
    health::{components, HealthRegistry},
    observability::{AdmissionMetrics, StructuredLogger},
    CappingProcessor, LimitRangeCalculator, NoopLimitRangeCalculator, PassThroughProcessor,
    RecommendationProcessor, RecommendationProvider, StaticLimitRangeCalculator,
};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ADMISSION_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting vpa-admission");

    let config = AdmissionConfig::load()?;
    info!(
        instance = %config.instance,
        cap_to_policy = config.cap_to_policy,
        include_unmatched = config.include_unmatched,
        "Admission controller configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::RECOMMENDATION_PROCESSOR).await;

    let (limit_ranges, namespaces): (Arc<dyn LimitRangeCalculator>, usize) =
        match &config.limit_ranges_path {
            Some(path) => {
                let calculator = StaticLimitRangeCalculator::from_file(Path::new(path))?;
                let namespaces = calculator.namespace_count();
                health_registry.register(components::LIMIT_RANGES).await;
                (Arc::new(calculator), namespaces)
            }
            None => {
                health_registry
                    .set_degraded(components::LIMIT_RANGES, "No limit ranges configured")
                    .await;
                (Arc::new(NoopLimitRangeCalculator), 0)
            }
        };

    let processor: Arc<dyn RecommendationProcessor> = if config.cap_to_policy {
        Arc::new(CappingProcessor)
    } else {
        Arc::new(PassThroughProcessor)
    };

    let provider = RecommendationProvider::new(limit_ranges, processor)
        .with_include_unmatched(config.include_unmatched);

    let metrics = AdmissionMetrics::new();
    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(ADMISSION_VERSION, namespaces);

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics,
        logger.clone(),
        Arc::new(provider),
    ));

    health_registry.set_ready(true).await;

    tokio::select! {
        result = api::serve(config.api_port, app_state) => {
            if let Err(e) = &result {
                error!(error = %e, "API server exited");
            }
            logger.log_shutdown("API server exited");
            result
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
            info!("Shutting down");
            Ok(())
        }
    }
}
