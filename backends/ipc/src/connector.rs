//! Connection targets for the stream transport.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Type-erased connected stream.
pub type BoxedStream = Box<dyn AsyncStream>;

/// Opens the stream a transport talks over.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Establishes the connection.
    async fn connect(&self) -> io::Result<BoxedStream>;

    /// Human-readable target, used in logs and error messages.
    fn endpoint(&self) -> String;
}

/// Address of a JSON-RPC socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketAddress {
    /// UNIX domain socket, e.g. `~/.lightning/bitcoin/lightning-rpc`
    Unix(PathBuf),
    /// TCP `host:port`
    Tcp(String),
}

impl FromStr for SocketAddress {
    type Err = String;

    /// Accepts `tcp://host:port`, `unix:///path` or a bare socket path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("socket address is empty".to_string());
        }
        if let Some(addr) = s.strip_prefix("tcp://") {
            if addr.is_empty() {
                return Err(format!("missing host:port in {}", s));
            }
            return Ok(SocketAddress::Tcp(addr.to_string()));
        }
        let path = s.strip_prefix("unix://").unwrap_or(s);
        if path.is_empty() {
            return Err(format!("missing socket path in {}", s));
        }
        Ok(SocketAddress::Unix(PathBuf::from(path)))
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketAddress::Unix(path) => write!(f, "unix://{}", path.display()),
            SocketAddress::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

#[async_trait]
impl Connector for SocketAddress {
    async fn connect(&self) -> io::Result<BoxedStream> {
        match self {
            #[cfg(unix)]
            SocketAddress::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path).await?;
                Ok(Box::new(stream))
            }
            #[cfg(not(unix))]
            SocketAddress::Unix(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "UNIX sockets are not available on this platform",
            )),
            SocketAddress::Tcp(addr) => {
                let stream = tokio::net::TcpStream::connect(addr.as_str()).await?;
                stream.set_nodelay(true)?;
                Ok(Box::new(stream))
            }
        }
    }

    fn endpoint(&self) -> String { self.to_string() }
}

/// Hands out one already-connected stream.
///
/// Useful for in-memory pipes such as [`tokio::io::duplex`]. Any connection
/// attempt after the first fails.
pub struct StreamConnector {
    stream: Mutex<Option<BoxedStream>>,
    label: String,
}

impl StreamConnector {
    /// Wraps `stream`; `label` names it in logs.
    pub fn new(stream: impl AsyncStream + 'static, label: impl Into<String>) -> Self {
        let stream: BoxedStream = Box::new(stream);
        Self { stream: Mutex::new(Some(stream)), label: label.into() }
    }
}

#[async_trait]
impl Connector for StreamConnector {
    async fn connect(&self) -> io::Result<BoxedStream> {
        let taken = self.stream.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take();
        taken.ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "stream already taken"))
    }

    fn endpoint(&self) -> String { self.label.clone() }
}
