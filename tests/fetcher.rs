use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use httpmock::Method::HEAD;
use httpmock::prelude::*;
use samary::{FetchConfig, FetchError, FetchRequest, Fetcher};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use url::Url;

const CHUNKED_HTML: &str =
    "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ntransfer-encoding: chunked\r\n\r\n";

fn fetcher(config: FetchConfig) -> Fetcher {
    Fetcher::new(config).expect("client should build")
}

fn url(server: &MockServer, path: &str) -> Url {
    Url::parse(&server.url(path)).unwrap()
}

// Plain TCP server for responses httpmock cannot shape: no declared length,
// bodies written over time, custom reason phrases.
async fn raw_server<F, Fut>(respond: F) -> Url
where
    F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let respond = Arc::new(respond);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                if read_request_head(&mut socket).await.is_ok() {
                    let _ = respond(socket).await;
                }
            });
        }
    });
    Url::parse(&format!("http://{addr}/page")).unwrap()
}

async fn read_request_head(socket: &mut TcpStream) -> std::io::Result<()> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|window| window == b"\r\n\r\n") {
        let read = socket.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        head.extend_from_slice(&buf[..read]);
    }
    Ok(())
}

async fn write_chunk(socket: &mut TcpStream, data: &[u8]) -> std::io::Result<()> {
    socket
        .write_all(format!("{:x}\r\n", data.len()).as_bytes())
        .await?;
    socket.write_all(data).await?;
    socket.write_all(b"\r\n").await?;
    socket.flush().await
}

#[tokio::test]
async fn follows_redirects_forwarding_set_cookies() {
    let server = MockServer::start_async().await;
    let start = server
        .mock_async(|when, then| {
            when.method(GET).path("/start");
            then.status(302).header("location", "/middle").header(
                "set-cookie",
                "a=1; Path=/; Expires=Wed, 09 Jun 2021 10:18:14 GMT, b=2; HttpOnly",
            );
        })
        .await;
    let middle = server
        .mock_async(|when, then| {
            when.method(GET).path("/middle").header("cookie", "a=1; b=2");
            then.status(301)
                .header("location", server.url("/final"))
                .header("set-cookie", "c=3; Secure");
        })
        .await;
    let last = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/final")
                .header("cookie", "a=1; b=2; c=3")
                .header("accept", "text/html,application/xhtml+xml");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body("<html><head><title>done</title></head></html>");
        })
        .await;

    let document = fetcher(FetchConfig::default())
        .fetch_document(&url(&server, "/start"), None)
        .await
        .expect("redirect chain should resolve");

    start.assert_async().await;
    middle.assert_async().await;
    last.assert_async().await;
    assert_eq!(document.url.path(), "/final");
    assert!(document.html.contains("<title>done</title>"));
}

#[tokio::test]
async fn redirect_chain_is_bounded() {
    let server = MockServer::start_async().await;
    let looping = server
        .mock_async(|when, then| {
            when.method(GET).path("/loop");
            then.status(302).header("location", "/loop");
        })
        .await;

    let err = fetcher(FetchConfig::default().with_max_redirects(3))
        .get(&url(&server, "/loop"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::TooManyRedirects(3)), "{err:?}");
    assert_eq!(looping.hits_async().await, 4);
    assert!(!err.is_permanent());
}

#[tokio::test]
async fn redirect_without_location_fails() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/nowhere");
            then.status(307);
        })
        .await;

    let err = fetcher(FetchConfig::default())
        .get(&url(&server, "/nowhere"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::MissingLocation(307)), "{err:?}");
}

#[tokio::test]
async fn client_errors_are_permanent_and_server_errors_transient() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).body("nope");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/broken");
            then.status(503);
        })
        .await;
    let fetcher = fetcher(FetchConfig::default());

    let err = fetcher.get(&url(&server, "/missing")).await.unwrap_err();
    assert!(err.is_permanent());
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "404 Not Found");

    let err = fetcher.get(&url(&server, "/broken")).await.unwrap_err();
    assert!(!err.is_permanent());
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn rejects_non_html_documents() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/image");
            then.status(200)
                .header("content-type", "image/png")
                .body(vec![0u8; 64]);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/untyped");
            then.status(200).body("<html></html>");
        })
        .await;
    let fetcher = fetcher(FetchConfig::default());

    let err = fetcher
        .fetch_document(&url(&server, "/image"), None)
        .await
        .unwrap_err();
    assert!(
        matches!(&err, FetchError::RejectedContentType(Some(ct)) if ct == "image/png"),
        "{err:?}"
    );

    let err = fetcher
        .fetch_document(&url(&server, "/untyped"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::RejectedContentType(None)), "{err:?}");
}

#[tokio::test]
async fn generic_get_accepts_any_content_type() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/data.json").header("accept", "*/*");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"ok":true}"#);
        })
        .await;

    let response = fetcher(FetchConfig::default())
        .get(&url(&server, "/data.json"))
        .await
        .unwrap();
    assert_eq!(response.content_type(), Some("application/json"));
    let value: serde_json::Value = response.json().unwrap();
    assert_eq!(value["ok"], true);
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/big");
            then.status(200)
                .header("content-type", "text/html")
                .body("x".repeat(4096));
        })
        .await;

    let err = fetcher(FetchConfig::default().with_max_size(1024))
        .fetch_document(&url(&server, "/big"), None)
        .await
        .unwrap_err();
    match err {
        FetchError::TooLarge { size, max } => {
            assert_eq!(max, 1024);
            assert!(size > 1024);
        }
        other => panic!("expected TooLarge, got {other:?}"),
    }
}

#[tokio::test]
async fn undeclared_length_is_capped_while_streaming() {
    let page = raw_server(|mut socket| async move {
        socket.write_all(CHUNKED_HTML.as_bytes()).await?;
        for _ in 0..10 {
            write_chunk(&mut socket, &[b'z'; 800]).await?;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        socket.write_all(b"0\r\n\r\n").await
    })
    .await;

    let err = fetcher(FetchConfig::default().with_max_size(1024))
        .fetch_document(&page, None)
        .await
        .unwrap_err();
    match err {
        FetchError::TooLarge { size, max } => {
            assert_eq!(max, 1024);
            assert!(size > 1024, "{size}");
            assert!(size < 8000, "whole body was read: {size}");
        }
        other => panic!("expected TooLarge, got {other:?}"),
    }
}

#[tokio::test]
async fn body_at_the_cap_is_accepted() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/exact");
            then.status(200).body("y".repeat(1024));
        })
        .await;

    let response = fetcher(FetchConfig::default().with_max_size(1024))
        .get(&url(&server, "/exact"))
        .await
        .unwrap();
    assert_eq!(response.body.len(), 1024);
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/slow");
            then.status(200)
                .header("content-type", "text/html")
                .delay(Duration::from_secs(3))
                .body("<html></html>");
        })
        .await;

    let err = fetcher(FetchConfig::default().with_timeout(Duration::from_millis(200)))
        .fetch_document(&url(&server, "/slow"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Timeout), "{err:?}");
    assert!(!err.is_permanent());
}

#[tokio::test]
async fn deadline_covers_the_body_transfer() {
    let page = raw_server(|mut socket| async move {
        socket.write_all(CHUNKED_HTML.as_bytes()).await?;
        for _ in 0..20 {
            write_chunk(&mut socket, b"<p>slow</p>").await?;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        socket.write_all(b"0\r\n\r\n").await
    })
    .await;

    let err = fetcher(FetchConfig::default().with_timeout(Duration::from_millis(500)))
        .fetch_document(&page, None)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Timeout), "{err:?}");
}

#[tokio::test]
async fn deadline_covers_the_whole_redirect_chain() {
    let server = MockServer::start_async().await;
    for (from, to) in [("/hop1", "/hop2"), ("/hop2", "/hop3"), ("/hop3", "/done")] {
        server
            .mock_async(|when, then| {
                when.method(GET).path(from);
                then.status(302)
                    .header("location", to)
                    .delay(Duration::from_millis(250));
            })
            .await;
    }
    server
        .mock_async(|when, then| {
            when.method(GET).path("/done");
            then.status(200).body("ok");
        })
        .await;

    let err = fetcher(FetchConfig::default().with_timeout(Duration::from_millis(600)))
        .get(&url(&server, "/hop1"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Timeout), "{err:?}");

    let response = fetcher(FetchConfig::default().with_timeout(Duration::from_secs(5)))
        .get(&url(&server, "/hop1"))
        .await
        .unwrap();
    assert_eq!(response.url.path(), "/done");
}

#[tokio::test]
async fn status_error_carries_the_server_reason_phrase() {
    let page = raw_server(|mut socket| async move {
        socket
            .write_all(b"HTTP/1.1 404 Gone Fishing\r\ncontent-length: 0\r\n\r\n")
            .await
    })
    .await;

    let err = fetcher(FetchConfig::default())
        .get(&page)
        .await
        .unwrap_err();
    assert!(err.is_permanent());
    assert_eq!(err.to_string(), "404 Gone Fishing");
}

#[tokio::test]
async fn cancelled_token_aborts_the_fetch() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/page");
            then.status(200)
                .delay(Duration::from_secs(3))
                .body("late");
        })
        .await;

    let fetcher = fetcher(FetchConfig::default());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = fetcher
        .execute_cancellable(FetchRequest::get(url(&server, "/page")), cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Cancelled), "{err:?}");
}

#[tokio::test]
async fn head_request_reads_no_body() {
    let server = MockServer::start_async().await;
    let icon = server
        .mock_async(|when, then| {
            when.method(HEAD).path("/favicon.ico");
            then.status(200).header("content-type", "image/x-icon");
        })
        .await;

    let response = fetcher(FetchConfig::default())
        .head(&url(&server, "/favicon.ico"))
        .await
        .unwrap();
    icon.assert_async().await;
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn document_request_sends_identity_headers() {
    let server = MockServer::start_async().await;
    let page = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/lang")
                .header("user-agent", "Samary")
                .header("accept-language", "ja-JP,en;q=0.5");
            then.status(200)
                .header("content-type", "application/xhtml+xml")
                .body("<html></html>");
        })
        .await;

    fetcher(FetchConfig::default())
        .fetch_document(&url(&server, "/lang"), Some("ja-JP,en;q=0.5"))
        .await
        .unwrap();
    page.assert_async().await;
}
