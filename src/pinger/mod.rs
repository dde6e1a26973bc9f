use std::sync::Arc;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{Duration, Instant, timeout};

use crate::address::{Address, AllowedAddressResolver, DEFAULT, ServerAddress};

pub mod codec;
pub mod status;

pub use status::{Player, Players, StatusResponse, Version};

const PROTOCOL_VERSION: i32 = 999;
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

#[derive(Debug, Error)]
pub enum PingError {
    #[error("unknown host {0}")]
    UnknownHost(String),
    #[error("timed out")]
    Timeout(#[from] tokio::time::error::Elapsed),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("premature end of stream")]
    PrematureEnd,
    #[error("VarInt too big")]
    VarIntTooBig,
    #[error("invalid packet id {0:#04x}")]
    InvalidPacketId(i32),
    #[error("invalid string length {0}")]
    InvalidStringLength(i32),
    #[error("invalid response {body:?}: {source}")]
    InvalidResponse {
        body: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("resolver task failed: {0}")]
    Resolver(#[from] tokio::task::JoinError),
}

impl PingError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            PingError::UnknownHost(_) => "unknown_host",
            PingError::Timeout(_) => "timeout",
            PingError::Io(_) => "io",
            PingError::PrematureEnd
            | PingError::VarIntTooBig
            | PingError::InvalidPacketId(_)
            | PingError::InvalidStringLength(_) => "protocol",
            PingError::InvalidResponse { .. } => "invalid_response",
            PingError::Resolver(_) => "resolver",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Status {
    pub resolved: Address,
    pub latency: Duration,
    pub response: StatusResponse,
}

/// Server List Ping client for one server.
pub struct ServerPinger {
    address: ServerAddress,
    timeout: Duration,
    // None uses the process-wide default, built lazily off the async runtime
    resolver: Option<Arc<AllowedAddressResolver>>,
}

impl ServerPinger {
    pub fn new(address: ServerAddress) -> Self {
        Self {
            address,
            timeout: DEFAULT_TIMEOUT,
            resolver: None,
        }
    }

    pub fn with_resolver(address: ServerAddress, resolver: Arc<AllowedAddressResolver>) -> Self {
        Self {
            resolver: Some(resolver),
            ..Self::new(address)
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    pub async fn ping(&self) -> Result<Status, PingError> {
        let resolved = self.resolve().await?;

        let start = Instant::now();
        let mut stream = timeout(self.timeout, TcpStream::connect(resolved.socket_addr())).await??;
        let body = timeout(self.timeout, exchange(&mut stream, &resolved)).await??;
        let latency = start.elapsed();

        let response = StatusResponse::from_json(&body)?;
        Ok(Status {
            resolved,
            latency,
            response,
        })
    }

    // resolution blocks, so it runs on the blocking pool
    async fn resolve(&self) -> Result<Address, PingError> {
        let resolver = self.resolver.clone();
        let address = self.address.clone();
        tokio::task::spawn_blocking(move || {
            let resolver = resolver.as_deref().unwrap_or(&**DEFAULT);
            resolver.resolve(&address)
        })
        .await?
        .ok_or_else(|| PingError::UnknownHost(self.address.to_string()))
    }
}

async fn exchange(stream: &mut TcpStream, resolved: &Address) -> Result<String, PingError> {
    let handshake = codec::handshake(resolved.host_name(), resolved.port(), PROTOCOL_VERSION);
    stream.write_all(&handshake).await?;
    stream.write_all(&codec::STATUS_REQUEST).await?;
    codec::read_status_response(stream).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{NoRedirect, SystemAddressResolver};
    use bytes::BytesMut;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn local_resolver() -> Arc<AllowedAddressResolver> {
        Arc::new(AllowedAddressResolver::new(
            Box::new(SystemAddressResolver),
            Box::new(NoRedirect),
        ))
    }

    struct Handshake {
        protocol: i32,
        host: String,
        port: u16,
        next_state: i32,
    }

    async fn read_handshake(socket: &mut TcpStream) -> Handshake {
        let _length = codec::read_var_int(socket).await.unwrap();
        assert_eq!(codec::read_var_int(socket).await.unwrap(), codec::HANDSHAKE_ID);
        let protocol = codec::read_var_int(socket).await.unwrap();
        let host_length = codec::read_var_int(socket).await.unwrap();
        let mut host = vec![0; host_length as usize];
        socket.read_exact(&mut host).await.unwrap();
        let port = socket.read_u16().await.unwrap();
        let next_state = codec::read_var_int(socket).await.unwrap();

        let mut request = [0u8; 2];
        socket.read_exact(&mut request).await.unwrap();
        assert_eq!(request, codec::STATUS_REQUEST);

        Handshake {
            protocol,
            host: String::from_utf8(host).unwrap(),
            port,
            next_state,
        }
    }

    async fn fake_server(packet_id: i32, json: &'static str) -> (u16, tokio::task::JoinHandle<Handshake>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let handshake = read_handshake(&mut socket).await;

            let mut body = BytesMut::new();
            codec::put_var_int(&mut body, packet_id);
            codec::put_string(&mut body, json);
            socket.write_all(&codec::frame(&body)).await.unwrap();
            handshake
        });
        (port, server)
    }

    #[tokio::test]
    async fn pings_server() {
        let (port, server) = fake_server(
            0x00,
            r#"{"version":{"name":"1.20.4","protocol":765},"players":{"max":20,"online":3},"description":"A server"}"#,
        )
        .await;

        let pinger = ServerPinger::with_resolver(ServerAddress::new("127.0.0.1", port), local_resolver());
        let status = pinger.ping().await.unwrap();

        assert_eq!(status.resolved.port(), port);
        assert_eq!(status.response.players.online, Some(3));
        assert_eq!(status.response.motd(), "A server");

        let handshake = server.await.unwrap();
        assert_eq!(handshake.protocol, PROTOCOL_VERSION);
        assert_eq!(handshake.host, "127.0.0.1");
        assert_eq!(handshake.port, port);
        assert_eq!(handshake.next_state, codec::NEXT_STATE_STATUS);
    }

    #[tokio::test]
    async fn wrong_packet_is_rejected() {
        let (port, server) = fake_server(0x05, "{}").await;

        let pinger = ServerPinger::with_resolver(ServerAddress::new("127.0.0.1", port), local_resolver());
        let err = pinger.ping().await.unwrap_err();

        assert!(matches!(err, PingError::InvalidPacketId(5)));
        assert_eq!(err.reason(), "protocol");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn invalid_json_is_rejected() {
        let (port, server) = fake_server(0x00, "{\"players\": ").await;

        let pinger = ServerPinger::with_resolver(ServerAddress::new("127.0.0.1", port), local_resolver());
        let err = pinger.ping().await.unwrap_err();

        assert_eq!(err.reason(), "invalid_response");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unknown_host_is_reported() {
        let pinger = ServerPinger::with_resolver(ServerAddress::new("no-such-server.invalid", 25570), local_resolver());
        let err = pinger.ping().await.unwrap_err();

        assert!(matches!(err, PingError::UnknownHost(ref host) if host == "no-such-server.invalid:25570"));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let pinger = ServerPinger::with_resolver(ServerAddress::new("127.0.0.1", port), local_resolver())
            .with_timeout(Duration::from_millis(200));
        let err = pinger.ping().await.unwrap_err();

        assert_eq!(err.reason(), "timeout");
        server.abort();
    }
}
