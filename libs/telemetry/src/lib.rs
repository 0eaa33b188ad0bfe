//! Telemetry bootstrap for the SOS messenger bot.
//! Installs the `tracing` subscriber and names the counters services emit
//! through the `metrics` facade.

use anyhow::Result;

mod config;
mod counters;
mod tracing_init;

pub use config::TelemetryConfig;
pub use counters::{
    COUNTERS, NLU_RUNS, OUTBOUND_FAILED, OUTBOUND_SENT, SESSIONS_CREATED, SESSIONS_EVICTED,
    WEBHOOK_EVENTS_RECEIVED, WEBHOOK_SIGNATURE_REJECTED, describe_counters, with_event_fields,
};
pub use tracing_init::init_telemetry;

/// Installs the shared subscriber configured from `RUST_LOG` and `LOG_FORMAT`.
///
/// Pass the calling binary's `env!("CARGO_PKG_VERSION")` as `service_version`.
pub fn install(service_name: &str, service_version: &str) -> Result<()> {
    init_telemetry(service_config(service_name, service_version))
}

fn service_config(service_name: &str, service_version: &str) -> TelemetryConfig {
    TelemetryConfig::from_env(service_name, service_version)
}
