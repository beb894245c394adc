use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, SocketAddr};
use tokio::net::{lookup_host, TcpStream};

/// The network capability the prober depends on.
///
/// `connect` reports whether the remote end accepted a TCP handshake; the prober
/// bounds every call with its own timeout, so implementations may block
/// indefinitely. `resolve` turns a host string into one address and runs once per scan.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn resolve(&self, address: &str) -> io::Result<IpAddr>;

    async fn connect(&self, addr: SocketAddr) -> io::Result<()>;
}

/// Real sockets via tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn resolve(&self, address: &str) -> io::Result<IpAddr> {
        let host = address.trim();
        if host.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty address"));
        }
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }
        pick_address(lookup_host((host, 0)).await?.map(|sa| sa.ip()))
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses returned"))
    }

    async fn connect(&self, addr: SocketAddr) -> io::Result<()> {
        // The stream is dropped on return, closing the socket.
        TcpStream::connect(addr).await.map(drop)
    }
}

/// First IPv4 address if there is one, else the first address.
///
/// Hosts files often list `::1 localhost` ahead of `127.0.0.1`, while services
/// commonly bind IPv4 only.
pub fn pick_address(addrs: impl IntoIterator<Item = IpAddr>) -> Option<IpAddr> {
    let mut first = None;
    for ip in addrs {
        if ip.is_ipv4() {
            return Some(ip);
        }
        first.get_or_insert(ip);
    }
    first
}
