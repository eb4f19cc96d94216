use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "folata_purge_calls_total",
            Unit::Count,
            "Total number of purge backend calls issued."
        );
        describe_counter!(
            "folata_purge_call_failure_total",
            Unit::Count,
            "Total number of purge backend calls that failed."
        );
        describe_counter!(
            "folata_purge_urls_succeeded_total",
            Unit::Count,
            "Total number of URLs whose invalidation succeeded."
        );
        describe_counter!(
            "folata_purge_urls_failed_total",
            Unit::Count,
            "Total number of URLs whose invalidation failed."
        );
        describe_counter!(
            "folata_log_append_failure_total",
            Unit::Count,
            "Total number of purge log appends that were dropped."
        );
        describe_counter!(
            "folata_log_prune_deleted_total",
            Unit::Count,
            "Total number of purge log entries removed by retention pruning."
        );
        describe_counter!(
            "folata_edge_version_bump_total",
            Unit::Count,
            "Total number of edge-cache version bumps."
        );
    });
}
