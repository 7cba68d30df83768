//! # Prometheus Metrics
//!
//! Flow counters and latency, scraped at `/metrics` on the metrics port.
//! Everything is registered in a dedicated [`prometheus::Registry`] under
//! the `goody` namespace.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metric handles for the node. Cheap to clone.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Flows started, by flow (`issue`, `transfer`, `exit`).
    pub flows_started_total: IntCounterVec,
    /// Flows that reached finality, by flow.
    pub flows_succeeded_total: IntCounterVec,
    /// Flows that ended without finality, by flow and failure kind.
    pub flows_failed_total: IntCounterVec,
    /// Wall-clock time from request to outcome, by flow.
    pub flow_latency_seconds: HistogramVec,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("goody".into()), None)?;

        let flows_started_total = IntCounterVec::new(
            Opts::new("flows_started_total", "Flows started"),
            &["flow"],
        )?;
        registry.register(Box::new(flows_started_total.clone()))?;

        let flows_succeeded_total = IntCounterVec::new(
            Opts::new("flows_succeeded_total", "Flows that reached finality"),
            &["flow"],
        )?;
        registry.register(Box::new(flows_succeeded_total.clone()))?;

        let flows_failed_total = IntCounterVec::new(
            Opts::new("flows_failed_total", "Flows that ended without finality"),
            &["flow", "kind"],
        )?;
        registry.register(Box::new(flows_failed_total.clone()))?;

        let flow_latency_seconds = HistogramVec::new(
            HistogramOpts::new("flow_latency_seconds", "End-to-end flow latency in seconds")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 30.0]),
            &["flow"],
        )?;
        registry.register(Box::new(flow_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            flows_started_total,
            flows_succeeded_total,
            flows_failed_total,
            flow_latency_seconds,
        })
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub type SharedMetrics = Arc<NodeMetrics>;

/// Renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(State(metrics): State<SharedMetrics>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_labelled_counters() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.flows_started_total.with_label_values(&["issue"]).inc();
        metrics
            .flows_failed_total
            .with_label_values(&["transfer", "insufficient_funds"])
            .inc();

        let text = metrics.encode().unwrap();
        assert!(text.contains("goody_flows_started_total{flow=\"issue\"} 1"));
        assert!(text.contains("kind=\"insufficient_funds\""));
    }
}
