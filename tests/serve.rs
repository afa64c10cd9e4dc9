//! Serving-loop behaviour over a real socket, spoken as raw HTTP/1.1.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use switchyard::{Container, Dispatcher, Request, Response, Router, Server, Settings};

const BODY_LIMIT: usize = 16;

async fn hello(req: Request) -> Response {
    Response::text(format!("hello {}", req.param("name").unwrap_or("?")))
}

async fn explode(_req: Request) -> Response {
    panic!("boom")
}

async fn body_len(req: Request) -> Response {
    Response::text(format!("got {} bytes", req.body().len()))
}

/// Sends one request with `Connection: close` and returns the raw response.
async fn roundtrip(addr: std::net::SocketAddr, method: &str, target: &str) -> String {
    send(addr, method, target, b"").await
}

/// Like [`roundtrip`], with a `Content-Length` body.
async fn send(addr: std::net::SocketAddr, method: &str, target: &str, body: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let head = format!(
        "{method} {target} HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\ncontent-length: {}\r\n\r\n",
        body.len()
    );
    let mut raw = head.into_bytes();
    raw.extend_from_slice(body);
    stream.write_all(&raw).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8(buf).unwrap().to_ascii_lowercase()
}

#[tokio::test]
async fn serves_routes_defaults_and_shuts_down() {
    let mut routes = Router::new();
    routes.get("/hello/{name}", hello);
    routes.get("/explode", explode);
    let dispatcher = Dispatcher::new(routes, Container::new()).unwrap();

    let settings = Settings {
        host: "127.0.0.1".to_owned(),
        port: 0,
        powered_by: "salamander".to_owned(),
        ..Settings::default()
    };
    let server = Server::from_settings(&settings).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve_on(listener, dispatcher, async {
        let _ = stopped.await;
    }));

    let ok = roundtrip(addr, "GET", "/hello/w%6Frld?x=1").await;
    assert!(ok.starts_with("http/1.1 200"), "{ok}");
    assert!(ok.contains("x-powered-by: salamander"), "{ok}");
    assert!(ok.ends_with("hello world"), "{ok}");

    let missing = roundtrip(addr, "GET", "/nope").await;
    assert!(missing.starts_with("http/1.1 404"), "{missing}");
    assert!(missing.contains("<h1>not found</h1>"), "{missing}");

    let not_allowed = roundtrip(addr, "POST", "/hello/x").await;
    assert!(not_allowed.starts_with("http/1.1 405"), "{not_allowed}");
    assert!(not_allowed.contains("allow: get"), "{not_allowed}");

    // A panicking handler with no errorHandler still gets a response, and
    // the server keeps serving afterwards.
    let exploded = roundtrip(addr, "GET", "/explode").await;
    assert!(exploded.starts_with("http/1.1 500"), "{exploded}");
    assert!(!exploded.contains("boom"), "{exploded}");

    let again = roundtrip(addr, "GET", "/hello/again").await;
    assert!(again.ends_with("hello again"), "{again}");

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not drain in time")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn oversized_bodies_get_413_and_the_server_keeps_serving() {
    let mut routes = Router::new();
    routes.post("/upload", body_len);
    let dispatcher = Dispatcher::new(routes, Container::new()).unwrap();

    let settings = Settings { max_body_bytes: BODY_LIMIT, ..Settings::default() };
    let server = Server::from_settings(&settings).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve_on(listener, dispatcher, async {
        let _ = stopped.await;
    }));

    let too_big = send(addr, "POST", "/upload", &[b'x'; BODY_LIMIT * 4]).await;
    assert!(too_big.starts_with("http/1.1 413"), "{too_big}");

    let fits = send(addr, "POST", "/upload", &[b'x'; BODY_LIMIT]).await;
    assert!(fits.starts_with("http/1.1 200"), "{fits}");
    assert!(fits.ends_with("got 16 bytes"), "{fits}");

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not drain in time")
        .unwrap()
        .unwrap();
}
