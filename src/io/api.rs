//! HTTP control and reporting API
//!
//! Routes:
//! - `POST /mapping/trigger` start a pass in the background
//! - `GET /mapping` current occupancy with region names
//! - `GET /mapping/last` summary of the most recent pass
//! - `POST /vehicles`, `POST /regions` bulk upserts into the memory store
//! - `GET /metrics` Prometheus text
//! - `GET /health` liveness plus build hash

use crate::domain::types::{Region, VehiclePosition};
use crate::infra::metrics::Metrics;
use crate::io::memory_store::MemoryStore;
use crate::io::prometheus::format_prometheus_metrics;
use crate::services::matcher::{MatchingEngine, PassError};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

const GIT_HASH: &str = env!("GIT_HASH");

/// Everything a request handler needs
pub struct ApiState {
    pub engine: Arc<MatchingEngine>,
    pub store: Arc<MemoryStore>,
    pub metrics: Arc<Metrics>,
    pub site_id: String,
}

fn response(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .body(Full::new(body.into()))
        .expect("static response should not fail")
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => response(status, "application/json", body),
        Err(e) => {
            error!(error = %e, "api_serialize_error");
            response(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", "serialization error")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &json!({ "ok": false, "error": message }))
}

/// Dispatch one request; separated from hyper so it can be driven in tests
pub async fn route(method: &Method, path: &str, body: Bytes, state: &ApiState) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::POST, "/mapping/trigger") => match state.engine.trigger_pass() {
            Ok(ack) => json_response(
                StatusCode::ACCEPTED,
                &json!({ "ok": true, "pass_id": ack.pass_id, "queued": ack.queued }),
            ),
            Err(PassError::Busy) => error_response(StatusCode::CONFLICT, "pass already running"),
            Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, &e.to_string()),
        },
        (&Method::GET, "/mapping") => match state.engine.occupancy_snapshot().await {
            Ok(view) => json_response(StatusCode::OK, &view),
            Err(e) => {
                warn!(error = %e, "occupancy_snapshot_failed");
                error_response(StatusCode::SERVICE_UNAVAILABLE, &e.to_string())
            }
        },
        (&Method::GET, "/mapping/last") => match state.engine.last_summary() {
            Some(summary) => json_response(StatusCode::OK, &summary),
            None => error_response(StatusCode::NOT_FOUND, "no pass has completed"),
        },
        (&Method::POST, "/vehicles") => match serde_json::from_slice::<Vec<VehiclePosition>>(&body) {
            Ok(positions) => {
                let upserted = state.store.upsert_vehicles(positions);
                info!(upserted = %upserted, "vehicles_upserted");
                json_response(StatusCode::OK, &json!({ "ok": true, "upserted": upserted }))
            }
            Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        },
        (&Method::POST, "/regions") => match serde_json::from_slice::<Vec<Region>>(&body) {
            Ok(regions) => {
                let upserted = state.store.upsert_regions(regions);
                info!(upserted = %upserted, "regions_upserted");
                json_response(StatusCode::OK, &json!({ "ok": true, "upserted": upserted }))
            }
            Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        },
        (&Method::GET, "/metrics") => response(
            StatusCode::OK,
            "text/plain; version=0.0.4; charset=utf-8",
            format_prometheus_metrics(&state.metrics, &state.site_id),
        ),
        (&Method::GET, "/health") => response(StatusCode::OK, "text/plain", format!("ok {GIT_HASH}")),
        _ => response(StatusCode::NOT_FOUND, "text/plain", "Not Found"),
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<ApiState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "api_body_read_error");
            return Ok(error_response(StatusCode::BAD_REQUEST, "unreadable body"));
        }
    };
    Ok(route(&parts.method, parts.uri.path(), body, &state).await)
}

/// Start the API server; returns when shutdown is signalled
pub async fn start_api_server(
    bind_address: &str,
    port: u16,
    state: Arc<ApiState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind((bind_address, port)).await?;

    info!(bind_address = %bind_address, port = %port, site = %state.site_id, "api_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let state = state.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let state = state.clone();
                                async move { handle_request(req, state).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "api_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "api_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("api_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
