use redis::aio::MultiplexedConnection;
use redis::RedisError;
use respkv::codec::DEFAULT_MAX_FRAME_SIZE;
use respkv::server::serve;
use respkv::store::Store;
use serial_test::serial;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, Duration};

async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(serve(listener, Store::new(), DEFAULT_MAX_FRAME_SIZE));

    addr
}

async fn connect() -> TcpStream {
    TcpStream::connect(start_server().await).await.unwrap()
}

async fn redis_connection() -> Result<MultiplexedConnection, RedisError> {
    let addr = start_server().await;
    let client = redis::Client::open(format!("redis://{}/", addr))?;
    client.get_multiplexed_async_connection().await
}

/// Sends `request` and asserts the server answers with exactly `expected`.
async fn assert_reply(stream: &mut TcpStream, request: &[u8], expected: &[u8]) {
    stream.write_all(request).await.unwrap();

    let mut buf = vec![0u8; expected.len()];
    stream.read_exact(&mut buf).await.unwrap();

    assert_eq!(
        String::from_utf8_lossy(&buf),
        String::from_utf8_lossy(expected)
    );
}

#[tokio::test]
async fn test_ping() {
    let mut stream = connect().await;

    for _ in 0..3 {
        assert_reply(&mut stream, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
    }
}

#[tokio::test]
async fn test_echo() {
    let mut stream = connect().await;

    for _ in 0..3 {
        assert_reply(
            &mut stream,
            b"*2\r\n$4\r\nECHO\r\n$3\r\nhey\r\n",
            b"+hey\r\n",
        )
        .await;
    }
}

#[tokio::test]
async fn test_set_and_get() {
    let mut stream = connect().await;

    assert_reply(
        &mut stream,
        b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n",
        b"+OK\r\n",
    )
    .await;
    assert_reply(
        &mut stream,
        b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n",
        b"+bar\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_get_missing_key() {
    let mut stream = connect().await;

    assert_reply(
        &mut stream,
        b"*2\r\n$3\r\nGET\r\n$7\r\nmissing\r\n",
        b"$-1\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_unknown_command() {
    let mut stream = connect().await;

    assert_reply(
        &mut stream,
        b"*2\r\n$6\r\nDBSIZE\r\n$3\r\nfoo\r\n",
        b"+PONG\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_store_is_shared_between_connections() {
    let addr = start_server().await;
    let mut writer = TcpStream::connect(addr).await.unwrap();
    let mut reader = TcpStream::connect(addr).await.unwrap();

    assert_reply(
        &mut writer,
        b"*3\r\n$3\r\nSET\r\n$6\r\nshared\r\n$5\r\nvalue\r\n",
        b"+OK\r\n",
    )
    .await;
    assert_reply(
        &mut reader,
        b"*2\r\n$3\r\nGET\r\n$6\r\nshared\r\n",
        b"+value\r\n",
    )
    .await;
}

#[tokio::test]
#[serial]
async fn test_set_with_px_expires() {
    let mut stream = connect().await;

    assert_reply(
        &mut stream,
        b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nPX\r\n$2\r\n50\r\n",
        b"+OK\r\n",
    )
    .await;
    assert_reply(&mut stream, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"+v\r\n").await;

    sleep(Duration::from_millis(100)).await;

    assert_reply(&mut stream, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"$-1\r\n").await;
}

#[tokio::test]
#[serial]
async fn test_set_with_invalid_px_never_expires() {
    let mut stream = connect().await;

    assert_reply(
        &mut stream,
        b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nPX\r\n$4\r\nsoon\r\n",
        b"+OK\r\n",
    )
    .await;

    sleep(Duration::from_millis(50)).await;

    assert_reply(&mut stream, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"+v\r\n").await;
}

#[tokio::test]
async fn test_half_array_then_close() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"*2\r\n$4\r\nECHO\r\n$5\r\nhel")
        .await
        .unwrap();
    stream.shutdown().await.unwrap();

    // The partial command lacks its argument; the server answers with an error and hangs up.
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    assert_eq!(
        String::from_utf8_lossy(&buf),
        "-ERR wrong number of arguments for 'echo' command\r\n"
    );

    // The server keeps serving other clients.
    let mut stream = TcpStream::connect(addr).await.unwrap();
    assert_reply(&mut stream, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
}

#[tokio::test]
async fn test_malformed_frame_closes_connection() {
    let mut stream = connect().await;

    stream.write_all(b"*1\r\n:42\r\n").await.unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();

    assert!(buf.is_empty());
}

#[tokio::test]
async fn test_redis_client() {
    let mut con = redis_connection().await.unwrap();

    let pong: String = redis::cmd("PING").query_async(&mut con).await.unwrap();
    assert_eq!(pong, "PONG");

    let ok: String = redis::cmd("SET")
        .arg("client_key")
        .arg("Argentina")
        .query_async(&mut con)
        .await
        .unwrap();
    assert_eq!(ok, "OK");

    let value: Option<String> = redis::cmd("GET")
        .arg("client_key")
        .query_async(&mut con)
        .await
        .unwrap();
    assert_eq!(value.as_deref(), Some("Argentina"));

    let missing: Option<String> = redis::cmd("GET")
        .arg("client_missing_key")
        .query_async(&mut con)
        .await
        .unwrap();
    assert_eq!(missing, None);
}
