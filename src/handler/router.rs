//! Request routing dispatch module
//!
//! Entry point for HTTP request processing, responsible for method validation,
//! health probes and dispatch to the image route.

use crate::config::AppState;
use crate::handler::image;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, SERVER};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
    pub range_header: Option<String>,
}

impl<'a> RequestContext<'a> {
    fn from_parts(req: &'a Parts) -> Self {
        let header = |name: &str| {
            req.headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };

        Self {
            path: req.uri.path(),
            is_head: req.method == Method::HEAD,
            if_none_match: header("if-none-match"),
            range_header: header("range"),
        }
    }
}

/// Main entry point for HTTP request handling
///
/// The request body is never read, so any body type is accepted.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let (parts, _) = req.into_parts();
    let mut response = route_request(&parts, &state).await;

    if let Ok(value) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(SERVER, value);
    }

    if state.cached_access_log.load(Ordering::Relaxed) {
        logger::log_access(&access_entry(&parts, &response, remote_addr, started));
    }

    Ok(response)
}

async fn route_request(req: &Parts, state: &AppState) -> Response<Full<Bytes>> {
    // 1. Check HTTP method
    if let Some(resp) = check_http_method(&req.method, state.config.http.enable_cors) {
        return resp;
    }

    let ctx = RequestContext::from_parts(req);

    // 2. Health check endpoints
    let health = &state.config.health;
    if health.enabled {
        if ctx.path == health.liveness_path {
            return http::build_health_response(200, "ok");
        }
        if ctx.path == health.readiness_path {
            return if image::image_available(&state.image.path).await {
                http::build_health_response(200, "ok")
            } else {
                http::build_health_response(503, "image unavailable")
            };
        }
    }

    // 3. The image route (exact match, query ignored)
    if ctx.path == state.image.route {
        return image::serve_image(&ctx, &state.image.path).await;
    }

    logger::log_debug(&format!("No route for path: {}", ctx.path));
    http::build_404_response()
}

/// Check HTTP method and return appropriate response for non-GET/HEAD methods
fn check_http_method(method: &Method, enable_cors: bool) -> Option<Response<Full<Bytes>>> {
    match *method {
        Method::GET | Method::HEAD => None,
        Method::OPTIONS => Some(http::build_options_response(enable_cors)),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

fn access_entry(
    req: &Parts,
    response: &Response<Full<Bytes>>,
    remote_addr: SocketAddr,
    started: Instant,
) -> AccessLogEntry {
    let version = format!("{:?}", req.version);

    AccessLogEntry {
        remote_addr: remote_addr.ip().to_string(),
        time: chrono::Local::now(),
        method: req.method.to_string(),
        uri: req
            .uri
            .path_and_query()
            .map_or_else(|| req.uri.path().to_string(), ToString::to_string),
        http_version: version.trim_start_matches("HTTP/").to_string(),
        status: response.status().as_u16(),
        body_bytes: usize::try_from(response.body().size_hint().exact().unwrap_or(0))
            .unwrap_or(usize::MAX),
        user_agent: req
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string),
        elapsed: started.elapsed(),
    }
}
