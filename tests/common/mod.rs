#![allow(dead_code)]

use async_trait::async_trait;
use portprobe::connector::Connector;
use std::collections::{HashMap, HashSet};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Deterministic stand-in for the network.
///
/// Ports in `open` accept, ports in `hang` never answer, everything else refuses.
/// Addresses containing `..` fail to resolve.
#[derive(Default)]
pub struct FakeConnector {
    open: HashSet<u16>,
    hang: HashSet<u16>,
    delay: HashMap<u16, Duration>,
    pub attempts: AtomicUsize,
    pub resolves: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    pub max_in_flight: AtomicUsize,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.open.extend(ports);
        self
    }

    pub fn hang(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.hang.extend(ports);
        self
    }

    pub fn delay(mut self, port: u16, d: Duration) -> Self {
        self.delay.insert(port, d);
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn resolve(&self, address: &str) -> io::Result<IpAddr> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        if address.trim().is_empty() || address.contains("..") {
            return Err(io::Error::new(io::ErrorKind::NotFound, "unknown host"));
        }
        Ok(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    async fn connect(&self, addr: SocketAddr) -> io::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(self.in_flight.clone());

        let port = addr.port();
        if self.hang.contains(&port) {
            std::future::pending::<()>().await;
        }
        if let Some(d) = self.delay.get(&port) {
            tokio::time::sleep(*d).await;
        }
        if self.open.contains(&port) {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        }
    }
}

pub fn shared(fake: FakeConnector) -> (Arc<FakeConnector>, Arc<dyn Connector>) {
    let fake = Arc::new(fake);
    let dyn_fake: Arc<dyn Connector> = fake.clone();
    (fake, dyn_fake)
}
