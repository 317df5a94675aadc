//! Minimal HTTP surface over a [`HealthMonitor`]: `/health`, `/alerts`,
//! `/metrics`. Grounded on the venue health-check server's hyper service,
//! trimmed from four endpoints (it also had `/ready` and `/status`, which
//! this framework folds into `/health`) to the three an operator dashboard
//! actually polls.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use tracing::{error, info};

use crate::HealthMonitor;

/// Serves a [`HealthMonitor`]'s snapshot over plain HTTP on `127.0.0.1:<port>`.
pub struct HealthCheckServer {
    monitor: Arc<HealthMonitor>,
    port: u16,
}

impl HealthCheckServer {
    pub fn new(monitor: Arc<HealthMonitor>, port: u16) -> Self {
        Self { monitor, port }
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        let monitor = self.monitor.clone();

        let make_svc = make_service_fn(move |_conn| {
            let monitor = monitor.clone();
            async move { Ok::<_, Infallible>(service_fn(move |req| handle(req, monitor.clone()))) }
        });

        info!(%addr, "health monitor HTTP surface listening");
        Server::bind(&addr).serve(make_svc).await.map_err(|e| {
            error!(error = %e, "health monitor server error");
            anyhow::anyhow!(e)
        })
    }
}

async fn handle(req: Request<Body>, monitor: Arc<HealthMonitor>) -> Result<Response<Body>, Infallible> {
    if req.method() != Method::GET {
        return Ok(Response::builder().status(StatusCode::METHOD_NOT_ALLOWED).body(Body::empty()).unwrap());
    }

    match req.uri().path() {
        "/health" => {
            monitor.check_once().await;
            let status = monitor.overall_status();
            let body = serde_json::json!({ "status": status });
            Ok(json_response(StatusCode::OK, &body))
        }
        "/alerts" => {
            let alerts = monitor.recent_alerts(50);
            Ok(json_response(StatusCode::OK, &alerts))
        }
        "/metrics" => {
            let metrics = monitor.recent_metrics(500);
            Ok(json_response(StatusCode::OK, &metrics))
        }
        _ => Ok(Response::builder().status(StatusCode::NOT_FOUND).body(Body::empty()).unwrap()),
    }
}

fn json_response(status: StatusCode, body: &impl serde::Serialize) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap_or_default()))
        .unwrap()
}
