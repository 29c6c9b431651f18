//! HTTP exposition server for Prometheus scraping (spec.md ambient stack:
//! "metric exposition").
//!
//! Grounded on the teacher's `monitoring::server::MetricsServer` for the
//! hyper 1.x raw-service connection loop (orthogonal to the trading domain,
//! so it carries over almost unchanged); request dispatch here runs through
//! a `Route` enum and a `dispatch` match rather than the teacher's chain of
//! `if path == ..` checks, since a scrape target only ever wants one of two
//! outcomes and a match makes that total.

use super::MetricsRegistry;
use anyhow::{Context, Result};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    pub listen_addr: SocketAddr,
    pub metrics_path: String,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self { listen_addr: "0.0.0.0:9184".parse().unwrap(), metrics_path: "/metrics".to_string() }
    }
}

pub struct MetricsServer {
    config: MetricsServerConfig,
    registry: Arc<MetricsRegistry>,
}

impl MetricsServer {
    pub fn new(config: MetricsServerConfig, registry: Arc<MetricsRegistry>) -> Self {
        Self { config, registry }
    }

    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr).await.context("failed to bind metrics server")?;
        info!(addr = %self.config.listen_addr, path = %self.config.metrics_path, "metrics server listening");

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!(error = %e, "failed to accept metrics connection");
                    continue;
                }
            };

            let registry = self.registry.clone();
            let metrics_path = self.config.metrics_path.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let route = Route::classify(req.uri().path(), &metrics_path);
                    let registry = registry.clone();
                    async move { Ok::<_, hyper::Error>(dispatch(route, &registry)) }
                });
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(remote = %remote_addr, error = %e, "metrics connection closed with error");
                }
            });
        }
    }
}

/// The only two things a scrape target can ask this server for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Scrape,
    NotFound,
}

impl Route {
    fn classify(path: &str, metrics_path: &str) -> Self {
        if path == metrics_path {
            Route::Scrape
        } else {
            Route::NotFound
        }
    }
}

fn dispatch(route: Route, registry: &MetricsRegistry) -> Response<Full<Bytes>> {
    match route {
        Route::Scrape => scrape_response(registry),
        Route::NotFound => plain_response(StatusCode::NOT_FOUND, "not found"),
    }
}

fn scrape_response(registry: &MetricsRegistry) -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let metric_families = registry.registry().gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "failed to encode metrics");
        return plain_response(StatusCode::INTERNAL_SERVER_ERROR, "encode error");
    }

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", encoder.format_type())
        .body(Full::new(Bytes::from(buffer)))
        .unwrap()
}

fn plain_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder().status(status).body(Full::new(Bytes::from_static(body.as_bytes()))).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_the_configured_path_as_scrape() {
        assert_eq!(Route::classify("/metrics", "/metrics"), Route::Scrape);
        assert_eq!(Route::classify("/favicon.ico", "/metrics"), Route::NotFound);
    }

    #[test]
    fn scrape_response_is_ok_with_prometheus_content_type() {
        let registry = MetricsRegistry::new().unwrap();
        registry.equity.set(10000.0);
        let response = scrape_response(&registry);
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("content-type").is_some());
    }
}
