//! Firmware image serving module
//!
//! Reads the configured image file and builds the download response.

use crate::error::ImageError;
use crate::handler::router::RequestContext;
use crate::http::{self, cache, RangeOutcome};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Image bytes read in one open/read/close cycle
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub data: Bytes,
    pub etag: String,
}

/// Read the whole image at `path`
///
/// The handle lives only inside this function, so it is closed on success
/// and on every error path alike.
pub async fn load_image(path: &Path) -> Result<LoadedImage, ImageError> {
    let io_err = |e: std::io::Error| ImageError::from_io(path.to_path_buf(), e);

    let mut file = File::open(path).await.map_err(io_err)?;
    let metadata = file.metadata().await.map_err(io_err)?;
    if !metadata.is_file() {
        return Err(ImageError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    let mut data = Vec::with_capacity(usize::try_from(metadata.len()).unwrap_or_default());
    file.read_to_end(&mut data).await.map_err(io_err)?;

    let etag = cache::generate_etag(&data);
    Ok(LoadedImage {
        data: Bytes::from(data),
        etag,
    })
}

/// Whether the image is currently present as a regular file
pub async fn image_available(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|m| m.is_file())
}

/// Serve the image with conditional and range request support
pub async fn serve_image(ctx: &RequestContext<'_>, path: &Path) -> Response<Full<Bytes>> {
    match load_image(path).await {
        Ok(image) => build_image_response(ctx, image),
        Err(err) if err.status() == 404 => {
            logger::log_warning(&err.to_string());
            http::build_404_response()
        }
        Err(err) => {
            logger::log_error(&err.to_string());
            http::build_500_response()
        }
    }
}

fn build_image_response(ctx: &RequestContext<'_>, image: LoadedImage) -> Response<Full<Bytes>> {
    if cache::check_etag_match(ctx.if_none_match.as_deref(), &image.etag) {
        return http::build_304_response(&image.etag);
    }

    let total_size = image.data.len();
    match http::resolve_range(ctx.range_header.as_deref(), total_size) {
        RangeOutcome::Partial(range) => {
            let body = image.data.slice(range.start..=range.end);
            http::build_partial_response(body, &image.etag, range, total_size, ctx.is_head)
        }
        RangeOutcome::Unsatisfiable => http::build_416_response(total_size),
        RangeOutcome::Full => http::build_image_response(image.data, &image.etag, ctx.is_head),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    fn ctx<'a>() -> RequestContext<'a> {
        RequestContext {
            path: "/image.bin",
            is_head: false,
            if_none_match: None,
            range_header: None,
        }
    }

    fn firmware_file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), bytes).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_image_reads_all_bytes() {
        let payload: Vec<u8> = (0..=255).cycle().take(70_000).collect();
        let file = firmware_file(&payload);

        let image = load_image(file.path()).await.unwrap();
        assert_eq!(image.data.as_ref(), payload.as_slice());
        assert_eq!(image.etag, cache::generate_etag(&payload));
    }

    #[tokio::test]
    async fn test_load_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_image(&dir.path().join("absent.bin")).await.unwrap_err();
        assert!(matches!(err, ImageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_load_directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_image(dir.path()).await.unwrap_err();
        assert!(matches!(err, ImageError::NotAFile { .. }));
        assert!(!image_available(dir.path()).await);
    }

    #[tokio::test]
    async fn test_serve_full_image() {
        let file = firmware_file(b"\xe9\x03\x02\x20firmware");
        let resp = serve_image(&ctx(), file.path()).await;

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["Content-Type"], "application/octet-stream");
        assert_eq!(resp.headers()["Content-Length"], "12");
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"\xe9\x03\x02\x20firmware");
    }

    #[tokio::test]
    async fn test_serve_missing_image_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let resp = serve_image(&ctx(), &dir.path().join("absent.bin")).await;
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn test_serve_not_modified() {
        let file = firmware_file(b"unchanged build");
        let etag = cache::generate_etag(b"unchanged build");
        let mut request = ctx();
        request.if_none_match = Some(etag.clone());

        let resp = serve_image(&request, file.path()).await;
        assert_eq!(resp.status(), 304);
        assert_eq!(resp.headers()["ETag"], etag.as_str());
        assert!(resp.into_body().collect().await.unwrap().to_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_serve_range() {
        let file = firmware_file(b"0123456789abcdef");
        let mut request = ctx();
        request.range_header = Some("bytes=10-".to_string());

        let resp = serve_image(&request, file.path()).await;
        assert_eq!(resp.status(), 206);
        assert_eq!(resp.headers()["Content-Range"], "bytes 10-15/16");
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"abcdef");
    }

    #[tokio::test]
    async fn test_serve_unsatisfiable_range() {
        let file = firmware_file(b"short");
        let mut request = ctx();
        request.range_header = Some("bytes=5-".to_string());

        let resp = serve_image(&request, file.path()).await;
        assert_eq!(resp.status(), 416);
        assert_eq!(resp.headers()["Content-Range"], "bytes */5");
    }

    #[tokio::test]
    async fn test_picks_up_rebuilt_image() {
        let file = firmware_file(b"build 1");
        let first = load_image(file.path()).await.unwrap();
        std::fs::write(file.path(), b"build 22").unwrap();
        let second = load_image(file.path()).await.unwrap();

        assert_eq!(second.data.as_ref(), b"build 22");
        assert_ne!(first.etag, second.etag);
    }
}
