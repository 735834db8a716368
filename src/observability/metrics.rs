//! Metrics collection and exposition.
//!
//! # Metrics
//! - `crowdfund_submissions_total` (counter): terminal outcomes by kind, outcome
//! - `crowdfund_submit_attempts_total` (counter): send attempts by kind
//! - `crowdfund_confirmation_seconds` (histogram): time spent confirming
//! - `crowdfund_decode_errors_total` (counter): undecodable program accounts
//! - `crowdfund_cached_campaigns` (gauge): campaigns in the session cache
//! - `crowdfund_ledger_health` (gauge): 1=reachable, 0=unreachable

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_submission(kind: &'static str, outcome: &'static str) {
    ::metrics::counter!("crowdfund_submissions_total", "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_submit_attempt(kind: &'static str) {
    ::metrics::counter!("crowdfund_submit_attempts_total", "kind" => kind).increment(1);
}

pub fn record_confirmation_time(kind: &'static str, elapsed: Duration) {
    ::metrics::histogram!("crowdfund_confirmation_seconds", "kind" => kind).record(elapsed.as_secs_f64());
}

pub fn record_decode_errors(count: usize) {
    ::metrics::counter!("crowdfund_decode_errors_total").increment(count as u64);
}

pub fn record_cache_size(size: usize) {
    ::metrics::gauge!("crowdfund_cached_campaigns").set(size as f64);
}

pub fn record_ledger_health(healthy: bool) {
    ::metrics::gauge!("crowdfund_ledger_health").set(if healthy { 1.0 } else { 0.0 });
}
