//! HTTP response building module
//!
//! Builders for every response the server sends. Builder failures are logged
//! and degrade to an empty response instead of panicking.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

use super::cache::IMAGE_CACHE_CONTROL;
use super::range::ByteRange;

/// Content type of the firmware image, regardless of file extension
pub const IMAGE_CONTENT_TYPE: &str = "application/octet-stream";

const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

/// Build 200 response carrying the whole image
pub fn build_image_response(data: Bytes, etag: &str, is_head: bool) -> Response<Full<Bytes>> {
    let content_length = data.len();
    let body = if is_head { Bytes::new() } else { data };

    Response::builder()
        .status(200)
        .header("Content-Type", IMAGE_CONTENT_TYPE)
        .header("Content-Length", content_length)
        .header("Accept-Ranges", "bytes")
        .header("ETag", etag)
        .header("Cache-Control", IMAGE_CACHE_CONTROL)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 206 Partial Content response; `data` is already sliced to `range`
pub fn build_partial_response(
    data: Bytes,
    etag: &str,
    range: ByteRange,
    total_size: usize,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let body = if is_head { Bytes::new() } else { data };

    Response::builder()
        .status(206)
        .header("Content-Type", IMAGE_CONTENT_TYPE)
        .header("Content-Length", range.length())
        .header("Content-Range", range.content_range(total_size))
        .header("Accept-Ranges", "bytes")
        .header("ETag", etag)
        .header("Cache-Control", IMAGE_CACHE_CONTROL)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error("206", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 304 Not Modified response
pub fn build_304_response(etag: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(304)
        .header("ETag", etag)
        .header("Cache-Control", IMAGE_CACHE_CONTROL)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error("304", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    build_text_response(404, "404 Not Found")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(405)
        .header("Content-Type", "text/plain")
        .header("Allow", ALLOWED_METHODS)
        .body(Full::new(Bytes::from("405 Method Not Allowed")))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(Full::new(Bytes::from("405 Method Not Allowed")))
        })
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(204)
        .header("Allow", ALLOWED_METHODS);

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", ALLOWED_METHODS)
            .header("Access-Control-Allow-Headers", "Range, If-None-Match")
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Build 416 Range Not Satisfiable response
pub fn build_416_response(file_size: usize) -> Response<Full<Bytes>> {
    Response::builder()
        .status(416)
        .header("Content-Type", "text/plain")
        .header("Content-Range", format!("bytes */{file_size}"))
        .body(Full::new(Bytes::from("Range Not Satisfiable")))
        .unwrap_or_else(|e| {
            log_build_error("416", &e);
            Response::new(Full::new(Bytes::from("Range Not Satisfiable")))
        })
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> Response<Full<Bytes>> {
    build_text_response(500, "500 Internal Server Error")
}

/// Build health probe response (200 or 503)
pub fn build_health_response(status: u16, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .header("Cache-Control", "no-store")
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap_or_else(|e| {
            log_build_error("health", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

fn build_text_response(status: u16, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap_or_else(|e| {
            log_build_error(&status.to_string(), &e);
            Response::new(Full::new(Bytes::from_static(body.as_bytes())))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
