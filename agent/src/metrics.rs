use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref MESSAGES_SENT_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "agent_messages_sent_total",
        "Total telemetry messages sent to the hub"
    ))
    .unwrap();
    pub static ref TEMPERATURE_ALERTS_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "agent_temperature_alerts_total",
        "Total telemetry messages flagged with temperatureAlert=true"
    ))
    .unwrap();
    pub static ref METHOD_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "agent_method_requests_total",
            "Total direct method requests by response status"
        ),
        &["status"]
    )
    .unwrap();
    pub static ref TWIN_PATCHES_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "agent_twin_patches_total",
        "Total reported property patches written to the twin"
    ))
    .unwrap();
    pub static ref TELEMETRY_INTERVAL_SECONDS: IntGauge = IntGauge::with_opts(Opts::new(
        "agent_telemetry_interval_seconds",
        "Current telemetry interval"
    ))
    .unwrap();
}

pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(MESSAGES_SENT_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TEMPERATURE_ALERTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(METHOD_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TWIN_PATCHES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TELEMETRY_INTERVAL_SECONDS.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub async fn metrics_handler() -> Response {
    match gather_metrics() {
        Ok(body) => body.into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub fn router() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}
