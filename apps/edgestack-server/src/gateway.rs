//! Gateway service that routes requests to the registered routers.
//!
//! Health-check probes (`/_health`, `/health`) are answered at the gateway
//! level with the status of every registered router. Everything else goes to
//! the first router whose [`ServiceRouter::matches`] returns `true`.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::service::Service;

use crate::service::{GatewayBody, RouterFuture, ServiceRouter, error_response, json_response};

/// Gateway over an ordered list of routers.
#[derive(Clone)]
pub struct GatewayService {
    services: Arc<Vec<Box<dyn ServiceRouter>>>,
}

impl std::fmt::Debug for GatewayService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayService")
            .field("services", &self.service_names())
            .finish()
    }
}

impl GatewayService {
    /// Create a gateway. Routers are consulted in order, so a catch-all goes last.
    pub fn new(services: Vec<Box<dyn ServiceRouter>>) -> Self {
        Self {
            services: Arc::new(services),
        }
    }

    /// Names of the registered routers, in dispatch order.
    pub fn service_names(&self) -> Vec<&'static str> {
        self.services.iter().map(|s| s.name()).collect()
    }

    /// Index of the router that should handle a request, if any.
    fn route(&self, method: &http::Method, uri: &http::Uri) -> Option<usize> {
        self.services.iter().position(|s| s.matches(method, uri))
    }
}

impl Service<http::Request<Incoming>> for GatewayService {
    type Response = http::Response<GatewayBody>;
    type Error = Infallible;
    type Future = RouterFuture;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        if is_health_check(req.method(), req.uri().path()) {
            let resp = health_check_response(&self.service_names());
            return Box::pin(async { Ok(resp) });
        }

        match self.route(req.method(), req.uri()) {
            Some(index) => self.services[index].call(req),
            None => Box::pin(async {
                Ok(error_response(
                    http::StatusCode::NOT_FOUND,
                    "NotFound",
                    "no service handles this request",
                ))
            }),
        }
    }
}

/// Check if the request is a health check probe.
fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET && (path == "/_health" || path == "/health")
}

/// Combined health response for all routers.
fn health_check_response(names: &[&'static str]) -> http::Response<GatewayBody> {
    let services: BTreeMap<&str, &str> = names.iter().map(|name| (*name, "running")).collect();
    json_response(
        http::StatusCode::OK,
        &serde_json::json!({ "services": services }),
    )
}
