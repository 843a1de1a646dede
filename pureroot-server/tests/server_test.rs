mod common;

use std::sync::Arc;

use pureroot_server::config::ServerConfig;
use pureroot_server::{CompositionRoot, ServerError, server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use common::FakeFactory;

#[tokio::test]
async fn serves_until_shutdown_then_disposes_root() {
    let singletons = FakeFactory::new("singleton");
    let scoped = FakeFactory::new("scoped");
    let root = Arc::new(
        CompositionRoot::builder()
            .singleton_dependency(singletons.producer())
            .scoped_dependency(scoped.producer())
            .build(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(server::serve(listener, root.clone(), async move {
        let _ = stopped.await;
    }));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /api/hello HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();

    assert!(raw.starts_with("HTTP/1.1 200 OK"));
    assert!(raw.contains(
        "Hello from controller with singleton1 and scoped1! \
         Also, hello from middleware with singleton1 and scoped1!"
    ));
    assert_eq!(scoped.created()[0].releases(), 1);
    assert!(!root.is_disposed());

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();

    assert!(root.is_disposed());
    assert_eq!(singletons.created()[0].releases(), 1);
}

#[tokio::test]
async fn bind_failure_is_an_io_error() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = ServerConfig {
        http_port: taken.local_addr().unwrap().port(),
        ..ServerConfig::default()
    };
    let root = Arc::new(CompositionRoot::new(&config));

    let err = server::run(&config, root, std::future::pending())
        .await
        .unwrap_err();

    assert!(matches!(err, ServerError::Io(_)));
}
