//! Prometheus metrics definitions and HTTP server

use std::net::SocketAddr;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info};

lazy_static::lazy_static! {
    /// Total number of reconciliations
    pub static ref RECONCILIATIONS: CounterVec = register_counter_vec!(
        "serviceplan_operator_reconciliations_total",
        "Total number of reconciliations",
        &["kind"]
    ).unwrap();

    /// Total number of reconciliation errors
    pub static ref RECONCILIATION_ERRORS: CounterVec = register_counter_vec!(
        "serviceplan_operator_reconciliation_errors_total",
        "Total number of reconciliation errors",
        &["kind"]
    ).unwrap();

    /// Reconciliation duration histogram
    pub static ref RECONCILE_DURATION: HistogramVec = register_histogram_vec!(
        "serviceplan_operator_reconcile_duration_seconds",
        "Duration of reconciliations in seconds",
        &["kind"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    ).unwrap();

    /// Reconciliations by outcome
    pub static ref RECONCILE_OUTCOMES: CounterVec = register_counter_vec!(
        "serviceplan_operator_reconcile_outcomes_total",
        "Reconciliations by outcome",
        &["kind", "outcome"]
    ).unwrap();

    /// Plans deleted after being withdrawn from the broker catalog
    pub static ref PLANS_DELETED: CounterVec = register_counter_vec!(
        "serviceplan_operator_plans_deleted_total",
        "Total number of withdrawn plans deleted",
        &["kind"]
    ).unwrap();

    /// Keys dropped without being reconciled successfully
    pub static ref KEYS_DROPPED: CounterVec = register_counter_vec!(
        "serviceplan_operator_keys_dropped_total",
        "Keys dropped after a permanent error or too many retries",
        &["kind"]
    ).unwrap();

    /// Keys waiting in the work queue
    pub static ref QUEUE_DEPTH: GaugeVec = register_gauge_vec!(
        "serviceplan_operator_queue_depth",
        "Number of keys waiting in the work queue",
        &["kind"]
    ).unwrap();

    /// Operator health (1 = healthy, 0 = unhealthy)
    pub static ref OPERATOR_HEALTH: prometheus::Gauge = prometheus::register_gauge!(
        "serviceplan_operator_health",
        "Operator health status (1 = healthy, 0 = unhealthy)"
    ).unwrap();
}

/// Start the metrics HTTP server
pub async fn serve(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    // Set initial health
    OPERATOR_HEALTH.set(1.0);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(handle_request))
                .await
            {
                error!("Error serving connection: {}", e);
            }
        });
    }
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let response = match req.uri().path() {
        "/metrics" => metrics_response(),
        "/healthz" | "/health" | "/readyz" | "/ready" => ok_response(),
        _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
    };

    Ok(response)
}

fn metrics_response() -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return text_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics");
    }

    let mut response = Response::new(Full::new(Bytes::from(buffer)));
    if let Ok(content_type) = encoder.format_type().parse() {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, content_type);
    }
    response
}

fn ok_response() -> Response<Full<Bytes>> {
    text_response(StatusCode::OK, "ok")
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
}
