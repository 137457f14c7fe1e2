//! One-shot troubleshooting snapshot, emitted on reaching Ready.

use chrono::Local;
use tracing::info;

use super::Supervisor;

pub(crate) fn emit_snapshot(supervisor: &Supervisor, overlay_loaded: bool) {
    let payload = serde_json::json!({
        "when": Local::now().to_rfc3339(),
        "runtime_version": env!("CARGO_PKG_VERSION"),
        "host_version": supervisor.start_info.host_version,
        "language": supervisor.language(),
        "language_source": supervisor.language_source().map(|s| format!("{s:?}")),
        "overlay_loaded": overlay_loaded,
        "plugins": supervisor.plugin_names(),
        "hooks_enabled": supervisor.hooks_enabled(),
        "telemetry_opt_out": supervisor.start_info.no_telemetry,
    });

    info!("Troubleshooting snapshot: {}", payload);
}
