//! Metrics collection for `Slimy`.
//!
//! Prometheus-compatible counters, gauges, and histograms. Every label
//! value comes from a closed set (move names, status names, error codes,
//! route names), so client input never reaches a label.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::SlimyError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Route names used as the `route` label.
const KNOWN_ROUTES: [&str; 7] = [
    "fight_start",
    "fight_get",
    "fight_move",
    "fight_ack",
    "heartbeat",
    "online_check",
    "online_list",
];

/// Returns the route name when known, `"__unknown__"` otherwise.
#[must_use]
pub fn sanitize_route_label(route: &str) -> &str {
    if KNOWN_ROUTES.contains(&route) {
        route
    } else {
        "__unknown__"
    }
}

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without
/// an HTTP endpoint.
///
/// # Errors
///
/// Returns `SlimyError::Io` if the recorder or HTTP listener
/// cannot be installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), SlimyError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| SlimyError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!("slimy_fights_started_total", "Fights created");
    describe_counter!(
        "slimy_fights_finished_total",
        "Fights that reached a terminal status"
    );
    describe_gauge!("slimy_fights_active", "Fights not yet finished");
    describe_counter!(
        "slimy_moves_total",
        "Move submissions by move and outcome"
    );
    describe_counter!("slimy_heartbeats_total", "Presence heartbeats received");
    describe_gauge!("slimy_presence_entries", "Identities held in the presence cache");
    describe_counter!(
        "slimy_presence_evictions_total",
        "Identities evicted from the presence cache"
    );
    describe_counter!(
        "slimy_mirror_failures_total",
        "Durable online-flag writes that gave up"
    );
    describe_histogram!(
        "slimy_request_duration_ms",
        "Request processing duration in milliseconds"
    );
}

/// Records a newly created fight.
pub fn record_fight_started() {
    counter!("slimy_fights_started_total").increment(1);
}

/// Records a fight reaching a terminal status.
pub fn record_fight_finished(status: &'static str) {
    counter!("slimy_fights_finished_total", "status" => status).increment(1);
}

/// Records a move submission and how it ended (`applied` or an error code).
pub fn record_move(mv: &'static str, outcome: &'static str) {
    counter!("slimy_moves_total", "move" => mv, "outcome" => outcome).increment(1);
}

/// Sets the number of unfinished fights.
#[allow(clippy::cast_precision_loss)]
pub fn set_fights_active(count: usize) {
    gauge!("slimy_fights_active").set(count as f64);
}

/// Records one heartbeat.
pub fn record_heartbeat() {
    counter!("slimy_heartbeats_total").increment(1);
}

/// Sets the presence cache size.
#[allow(clippy::cast_precision_loss)]
pub fn set_presence_entries(count: usize) {
    gauge!("slimy_presence_entries").set(count as f64);
}

/// Records identities evicted by a presence sweep.
pub fn record_presence_evictions(count: usize) {
    counter!("slimy_presence_evictions_total").increment(count as u64);
}

/// Records a durable online-flag write that exhausted its attempts.
pub fn record_mirror_failure(online: bool) {
    let target = if online { "online" } else { "offline" };
    counter!("slimy_mirror_failures_total", "target" => target).increment(1);
}

/// Records request processing duration.
pub fn record_request_duration(route: &str, status: u16, duration: Duration) {
    let label = sanitize_route_label(route);
    histogram!(
        "slimy_request_duration_ms",
        "route" => label.to_owned(),
        "status" => status.to_string(),
    )
    .record(duration.as_secs_f64() * 1000.0);
}
