use power_probe::{
    handle_connection,
    sensors::{ConstantSampler, RawSample, RawSampler},
    web::{ConnectionOptions, RESPONSE_HEADER},
    ConnectionServer, MonitorError, SensorPipeline, SensorSettings, VoltageDivider, WebConfig,
    ZeroCalibrator,
};
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const REQUEST: &[u8] = b"GET / HTTP/1.1\r\nHost: 192.168.4.1\r\n\r\n";

/// Connection wrapper that counts how many times it is released.
struct Tracked<C> {
    inner: C,
    releases: Arc<AtomicUsize>,
}

impl<C> Tracked<C> {
    fn new(inner: C) -> (Self, Arc<AtomicUsize>) {
        let releases = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                releases: Arc::clone(&releases),
            },
            releases,
        )
    }
}

impl<C> Drop for Tracked<C> {
    fn drop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

impl<C: AsyncRead + Unpin> AsyncRead for Tracked<C> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<C: AsyncWrite + Unpin> AsyncWrite for Tracked<C> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

struct FailingSampler;

impl RawSampler for FailingSampler {
    fn read(&self) -> power_probe::Result<RawSample> {
        Err(MonitorError::sampler_error("ADC not responding"))
    }
}

fn calibrated_pipeline(
    divider: VoltageDivider,
    voltage_raw: u16,
    current_raw: u16,
) -> SensorPipeline {
    SensorPipeline::calibrate(
        SensorSettings::default().with_divider(divider),
        &ZeroCalibrator::default().with_interval(Duration::ZERO),
        Box::new(ConstantSampler::new(voltage_raw)),
        Box::new(ConstantSampler::new(current_raw)),
    )
    .expect("calibration with constant samplers should succeed")
}

async fn spawn_server(
    pipeline: SensorPipeline,
) -> (SocketAddr, JoinHandle<power_probe::Result<()>>) {
    let config = WebConfig::new("127.0.0.1", 0);
    let server = ConnectionServer::bind(&config, Arc::new(pipeline))
        .await
        .expect("Should bind to an ephemeral port");
    let addr = server.local_addr().expect("Should report local address");
    (addr, tokio::spawn(server.run()))
}

async fn fetch(addr: SocketAddr) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("Should connect");
    stream.write_all(REQUEST).await.expect("Should send request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("Should read response");
    response
}

#[tokio::test]
async fn test_end_to_end_direct_input() {
    // Current raw sample equals the value seen during calibration.
    let pipeline = calibrated_pipeline(VoltageDivider::DIRECT, 2048, 1987);
    let (addr, server) = spawn_server(pipeline).await;

    let response = timeout(Duration::from_secs(5), fetch(addr))
        .await
        .expect("Response should arrive");

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Content-Type: text/html\r\n"));
    assert!(response.contains("Connection: close\r\n"));
    assert!(response.contains("Voltage:</strong> 1.65 V"));
    assert!(response.contains("Current:</strong> 0.00 A"));

    server.abort();
}

#[tokio::test]
async fn test_end_to_end_reference_divider() {
    let pipeline = calibrated_pipeline(VoltageDivider::REFERENCE, 2048, 2048);
    let (addr, server) = spawn_server(pipeline).await;

    let response = timeout(Duration::from_secs(5), fetch(addr))
        .await
        .expect("Response should arrive");

    assert!(response.contains("Voltage:</strong> 8.25 V"));
    assert!(response.contains("Current:</strong> 0.00 A"));

    server.abort();
}

#[tokio::test]
async fn test_any_request_gets_same_page() {
    let (addr, server) = spawn_server(calibrated_pipeline(VoltageDivider::DIRECT, 0, 0)).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"DELETE /nothing/here HTTP/1.0\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
        .await
        .expect("Response should arrive")
        .unwrap();

    assert!(response.starts_with(RESPONSE_HEADER));
    assert!(response.contains("Voltage:</strong> 0.00 V"));

    server.abort();
}

#[tokio::test]
async fn test_each_request_takes_a_fresh_reading() {
    let voltage = Arc::new(ConstantSampler::new(0));
    let pipeline = SensorPipeline::calibrate(
        SensorSettings::default().with_divider(VoltageDivider::DIRECT),
        &ZeroCalibrator::default().with_interval(Duration::ZERO),
        Box::new(Arc::clone(&voltage)),
        Box::new(ConstantSampler::new(2048)),
    )
    .expect("calibration with constant samplers should succeed");
    let (addr, server) = spawn_server(pipeline).await;

    let first = timeout(Duration::from_secs(5), fetch(addr))
        .await
        .expect("Response should arrive");
    assert!(first.contains("Voltage:</strong> 0.00 V"));

    voltage.set(4095);
    let second = timeout(Duration::from_secs(5), fetch(addr))
        .await
        .expect("Response should arrive");
    assert!(second.contains("Voltage:</strong> 3.30 V"));

    server.abort();
}

#[tokio::test]
async fn test_fifty_simultaneous_connections() {
    let pipeline = calibrated_pipeline(VoltageDivider::REFERENCE, 1000, 2048);
    let (addr, server) = spawn_server(pipeline).await;

    let clients: Vec<_> = (0..50).map(|_| tokio::spawn(fetch(addr))).collect();

    for client in clients {
        let response = timeout(Duration::from_secs(10), client)
            .await
            .expect("Every client should be served")
            .expect("Client task should not panic");
        assert!(response.starts_with(RESPONSE_HEADER));
        assert!(response.trim_end().ends_with("</html>"));
    }

    server.abort();
}

#[tokio::test]
async fn test_stalled_client_does_not_block_others() {
    let pipeline = calibrated_pipeline(VoltageDivider::REFERENCE, 1000, 2048);
    let (addr, server) = spawn_server(pipeline).await;

    // Connects first and never sends a byte.
    let stalled = TcpStream::connect(addr).await.unwrap();

    for _ in 0..5 {
        let response = timeout(Duration::from_secs(5), fetch(addr))
            .await
            .expect("Fast client should not wait on the stalled one");
        assert!(response.starts_with(RESPONSE_HEADER));
    }

    drop(stalled);
    server.abort();
}

#[tokio::test]
async fn test_server_survives_client_that_hangs_up() {
    let pipeline = calibrated_pipeline(VoltageDivider::REFERENCE, 1000, 2048);
    let (addr, server) = spawn_server(pipeline).await;

    for _ in 0..3 {
        let stream = TcpStream::connect(addr).await.unwrap();
        drop(stream);
    }

    let response = timeout(Duration::from_secs(5), fetch(addr))
        .await
        .expect("Server should keep accepting");
    assert!(response.starts_with(RESPONSE_HEADER));
    assert!(!server.is_finished());

    server.abort();
}

#[tokio::test]
async fn test_release_once_on_success() {
    let pipeline = calibrated_pipeline(VoltageDivider::REFERENCE, 1000, 2048);
    let (client, server_side) = tokio::io::duplex(64 * 1024);
    let (conn, releases) = Tracked::new(server_side);

    let (mut client, result) = tokio::join!(
        async move {
            let mut client = client;
            client.write_all(REQUEST).await.unwrap();
            client
        },
        handle_connection(conn, &pipeline, ConnectionOptions::default())
    );

    assert!(result.is_ok());
    assert_eq!(releases.load(Ordering::SeqCst), 1);

    let mut response = String::new();
    client.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with(RESPONSE_HEADER));
}

#[tokio::test]
async fn test_release_once_on_read_error() {
    let pipeline = calibrated_pipeline(VoltageDivider::REFERENCE, 1000, 2048);
    let mock = tokio_test::io::Builder::new()
        .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"))
        .build();
    let (conn, releases) = Tracked::new(mock);

    let result = handle_connection(conn, &pipeline, ConnectionOptions::default()).await;

    assert!(matches!(result, Err(MonitorError::Io(_))));
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_release_once_on_write_error() {
    let pipeline = calibrated_pipeline(VoltageDivider::REFERENCE, 1000, 2048);
    let mock = tokio_test::io::Builder::new()
        .read(REQUEST)
        .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
        .build();
    let (conn, releases) = Tracked::new(mock);

    let result = handle_connection(conn, &pipeline, ConnectionOptions::default()).await;

    assert!(matches!(result, Err(MonitorError::Io(_))));
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_release_once_when_client_drops_mid_transfer() {
    let pipeline = calibrated_pipeline(VoltageDivider::REFERENCE, 1000, 2048);
    let (mut client, server_side) = tokio::io::duplex(16);
    let (conn, releases) = Tracked::new(server_side);

    client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
    drop(client);

    let result = handle_connection(conn, &pipeline, ConnectionOptions::default()).await;

    assert!(result.is_err());
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sampler_failure_closes_without_response() {
    let pipeline = SensorPipeline::new(
        Box::new(FailingSampler),
        Box::new(ConstantSampler::new(2048)),
        SensorSettings::default().with_zero_offset(1.65),
    );
    let (client, server_side) = tokio::io::duplex(64 * 1024);
    let (conn, releases) = Tracked::new(server_side);

    let (mut client, result) = tokio::join!(
        async move {
            let mut client = client;
            client.write_all(REQUEST).await.unwrap();
            client
        },
        handle_connection(conn, &pipeline, ConnectionOptions::default())
    );

    assert!(matches!(result, Err(MonitorError::Sampler(_))));
    assert_eq!(releases.load(Ordering::SeqCst), 1);

    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    assert!(response.is_empty());
}
