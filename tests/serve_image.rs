use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use ota_image_server::config::{AppState, Config};
use ota_image_server::server;

struct TestServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    task: tokio::task::JoinHandle<()>,
    dir: tempfile::TempDir,
}

/// Start a server whose image root is a scratch directory
async fn start_server(image: Option<&[u8]>) -> TestServer {
    start_server_with_timeouts(image, 5).await
}

async fn start_server_with_timeouts(image: Option<&[u8]>, timeout_secs: u64) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("server.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
            [server]
            host = "127.0.0.1"
            port = 0

            [image]
            root = "{}"
            path = "build/wifi_smartconfig_test.bin"

            [logging]
            level = "error"
            access_log = false

            [performance]
            read_timeout = {timeout_secs}
            write_timeout = {timeout_secs}
            "#,
            dir.path().display()
        ),
    )
    .unwrap();

    if let Some(bytes) = image {
        write_image(dir.path(), bytes);
    }

    let cfg = Config::load_from(config_path.to_str().unwrap()).unwrap();
    let image = cfg.image_source(Path::new("/unused"));
    let listener = server::create_listener(cfg.get_socket_addr().unwrap()).unwrap();
    let addr = listener.local_addr().unwrap();

    let state = Arc::new(AppState::new(cfg, image));
    let task = tokio::spawn(server::serve(listener, Arc::clone(&state)));

    TestServer {
        addr,
        state,
        task,
        dir,
    }
}

fn write_image(root: &Path, bytes: &[u8]) {
    let build = root.join("build");
    std::fs::create_dir_all(&build).unwrap();
    std::fs::write(build.join("wifi_smartconfig_test.bin"), bytes).unwrap();
}

fn build_request(addr: SocketAddr, method: Method, path: &str) -> Request<Empty<Bytes>> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("Host", addr.to_string())
        .body(Empty::<Bytes>::new())
        .unwrap()
}

async fn request(addr: SocketAddr, method: Method, path: &str) -> (StatusCode, hyper::HeaderMap, Bytes) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    let conn_task = tokio::spawn(conn);

    let resp = sender
        .send_request(build_request(addr, method, path))
        .await
        .unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.into_body().collect().await.unwrap().to_bytes();

    drop(sender);
    let _ = conn_task.await;
    (status, headers, body)
}

async fn shutdown(server: TestServer) {
    server.state.request_shutdown();
    tokio::time::timeout(Duration::from_secs(10), server.task)
        .await
        .expect("server did not shut down")
        .unwrap();
}

#[tokio::test]
async fn serves_image_bytes_over_tcp() {
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let server = start_server(Some(payload.as_slice())).await;

    let (status, headers, body) = request(server.addr, Method::GET, "/image.bin").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "application/octet-stream");
    assert_eq!(headers["content-length"], payload.len().to_string().as_str());
    assert_eq!(body.len(), payload.len());
    assert_eq!(body.as_ref(), payload.as_slice());

    shutdown(server).await;
}

#[tokio::test]
async fn missing_image_returns_404_until_built() {
    let server = start_server(None).await;

    let (status, _, _) = request(server.addr, Method::GET, "/image.bin").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = request(server.addr, Method::GET, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    write_image(server.dir.path(), b"fresh build");
    let (status, _, body) = request(server.addr, Method::GET, "/image.bin").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_ref(), b"fresh build");

    shutdown(server).await;
}

#[tokio::test]
async fn head_and_unknown_routes() {
    let server = start_server(Some(&b"0123456789"[..])).await;

    let (status, headers, body) = request(server.addr, Method::HEAD, "/image.bin").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-length"], "10");
    assert!(body.is_empty());

    let (status, _, _) = request(server.addr, Method::GET, "/other.bin").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = request(server.addr, Method::DELETE, "/image.bin").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    shutdown(server).await;
}

/// A client with a small receive window, so the server cannot buffer the whole body in the kernel
fn small_window_client(addr: SocketAddr) -> TcpStream {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).unwrap();
    socket.set_recv_buffer_size(16 * 1024).unwrap();
    socket.connect(&addr.into()).unwrap();
    socket.set_nonblocking(true).unwrap();
    TcpStream::from_std(socket.into()).unwrap()
}

#[tokio::test]
async fn slow_reader_receives_whole_image() {
    let payload: Vec<u8> = (0..4 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
    let server = start_server_with_timeouts(Some(payload.as_slice()), 1).await;

    let mut stream = small_window_client(server.addr);
    stream
        .write_all(b"GET /image.bin HTTP/1.1\r\nHost: device\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    // About 800 KiB/s, so the transfer runs for several times the configured timeouts
    let mut received = Vec::new();
    let mut chunk = vec![0u8; 16 * 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        received.extend_from_slice(&chunk[..n]);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let body_start = received
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .unwrap()
        + 4;
    assert!(received.starts_with(b"HTTP/1.1 200 OK"));
    assert_eq!(received.len() - body_start, payload.len());
    assert_eq!(&received[body_start..], payload.as_slice());

    shutdown(server).await;
}

#[tokio::test]
async fn shutdown_closes_idle_keep_alive_client() {
    let server = start_server(Some(&b"image"[..])).await;
    let addr = server.addr;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    let conn_task = tokio::spawn(conn);

    let resp = sender
        .send_request(build_request(addr, Method::GET, "/image.bin"))
        .await
        .unwrap();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.as_ref(), b"image");
    assert_eq!(server.state.active_connections.load(std::sync::atomic::Ordering::SeqCst), 1);

    // The grace period is 5 seconds; an idle connection must not hold shutdown that long
    let started = Instant::now();
    shutdown(server).await;
    assert!(started.elapsed() < Duration::from_secs(2));

    tokio::time::timeout(Duration::from_secs(2), conn_task)
        .await
        .unwrap()
        .unwrap()
        .ok();
    drop(sender);
}
