//! Metrics collection and exposition.
//!
//! # Metrics
//! - `foundation_rpc_calls_total` (counter): calls by client, outcome
//! - `foundation_rpc_reconnects_total` (counter): redials by client, result
//! - `foundation_listener_rejections_total` (counter): guard denials by reason
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Outcome label of a call made through the resilient client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Ok,
    Failed,
    RecoveredOk,
    RecoveredFailed,
    /// The call ended because a redial failed.
    DialFailed,
}

impl CallOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            CallOutcome::Ok => "ok",
            CallOutcome::Failed => "failed",
            CallOutcome::RecoveredOk => "recovered_ok",
            CallOutcome::RecoveredFailed => "recovered_failed",
            CallOutcome::DialFailed => "dial_failed",
        }
    }
}

/// Install the Prometheus exporter with an HTTP scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_call(client: &str, outcome: CallOutcome) {
    metrics::counter!(
        "foundation_rpc_calls_total",
        "client" => client.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_reconnect(client: &str, success: bool) {
    metrics::counter!(
        "foundation_rpc_reconnects_total",
        "client" => client.to_string(),
        "result" => if success { "ok" } else { "failed" }
    )
    .increment(1);
}

pub fn record_listener_rejection(reason: &'static str) {
    metrics::counter!("foundation_listener_rejections_total", "reason" => reason).increment(1);
}
