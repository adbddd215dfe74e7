use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static DESCRIBE_ONCE: Once = Once::new();

/// Installs the process-wide tracing subscriber and registers metric
/// descriptions. `RUST_LOG` directives override the configured level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());

    let installed = match logging.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(true))
            .try_init(),
    };
    installed.map_err(|err| {
        InfraError::telemetry(format!("tracing subscriber install failed: {err}"))
    })
}

fn describe_metrics() {
    DESCRIBE_ONCE.call_once(|| {
        describe_counter!(
            "tasktide_migration_total",
            Unit::Count,
            "Total number of threshold-triggered migrations attempted."
        );
        describe_counter!(
            "tasktide_migration_moved_total",
            Unit::Count,
            "Total number of tasks moved into the archive by migrations."
        );
        describe_counter!(
            "tasktide_archive_failure_total",
            Unit::Count,
            "Total number of swallowed archive operation failures."
        );
        describe_gauge!(
            "tasktide_ws_clients",
            Unit::Count,
            "Current number of connected push-channel clients."
        );
        describe_counter!(
            "tasktide_broadcast_total",
            Unit::Count,
            "Total number of list snapshots published to the feed."
        );
    });
}
