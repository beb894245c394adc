use crate::config::ProbeConfig;
use crate::connector::{Connector, TcpConnector};
use crate::error::ProbeError;
use crate::types::{PortOutcome, PortReport, ScanResult, ScanTarget};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time;
use tokio_util::sync::CancellationToken;

/// Probe every port of `target` over real TCP sockets.
///
/// - Resolves the address once; failure aborts the whole scan.
/// - Limits concurrent connect attempts using a `Semaphore`.
/// - Uses `tokio::time::timeout` to bound each attempt; refusals and timeouts are `Closed`.
/// - Returns both lists sorted ascending whatever the completion order was.
pub async fn probe(target: &ScanTarget, config: &ProbeConfig) -> Result<ScanResult, ProbeError> {
    Prober::new(*config).probe(target).await
}

/// Variant that accepts a `CancellationToken` to allow external cancellation.
pub async fn probe_with_cancel(
    target: &ScanTarget,
    config: &ProbeConfig,
    cancel: CancellationToken,
) -> Result<ScanResult, ProbeError> {
    Prober::new(*config).probe_with_cancel(target, cancel).await
}

/// Live counters and an optional per-port report stream, shared with the caller during a scan.
#[derive(Clone, Debug, Default)]
pub struct SharedProgress {
    pub probed: Arc<AtomicU64>,
    pub open: Arc<AtomicU64>,
    reports: Option<mpsc::UnboundedSender<PortReport>>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also forward each classification to `tx` as soon as it is known.
    pub fn with_reports(tx: mpsc::UnboundedSender<PortReport>) -> Self {
        Self {
            reports: Some(tx),
            ..Self::default()
        }
    }

    pub fn probed(&self) -> u64 {
        self.probed.load(Ordering::Relaxed)
    }

    pub fn open(&self) -> u64 {
        self.open.load(Ordering::Relaxed)
    }

    fn record(&self, report: PortReport) {
        if report.outcome.is_open() {
            self.open.fetch_add(1, Ordering::Relaxed);
        }
        self.probed.fetch_add(1, Ordering::Relaxed);
        if let Some(tx) = &self.reports {
            // A dropped receiver only means nobody is listening any more.
            let _ = tx.send(report);
        }
    }
}

/// The port probe engine. Holds no state between calls; clone it freely.
#[derive(Clone)]
pub struct Prober {
    connector: Arc<dyn Connector>,
    config: ProbeConfig,
}

impl std::fmt::Debug for Prober {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prober").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Prober {
    pub fn new(config: ProbeConfig) -> Self {
        Self::with_connector(Arc::new(TcpConnector), config)
    }

    pub fn with_connector(connector: Arc<dyn Connector>, config: ProbeConfig) -> Self {
        Self { connector, config }
    }

    pub async fn probe(&self, target: &ScanTarget) -> Result<ScanResult, ProbeError> {
        self.run(target, None, None).await
    }

    pub async fn probe_with_cancel(
        &self,
        target: &ScanTarget,
        cancel: CancellationToken,
    ) -> Result<ScanResult, ProbeError> {
        self.run(target, Some(cancel), None).await
    }

    pub async fn probe_with_shared(
        &self,
        target: &ScanTarget,
        cancel: CancellationToken,
        shared: SharedProgress,
    ) -> Result<ScanResult, ProbeError> {
        self.run(target, Some(cancel), Some(shared)).await
    }

    async fn run(
        &self,
        target: &ScanTarget,
        cancel_opt: Option<CancellationToken>,
        shared_opt: Option<SharedProgress>,
    ) -> Result<ScanResult, ProbeError> {
        if !target.is_valid_range() {
            return Err(ProbeError::InvalidRange {
                start: target.start_port,
                end: target.end_port,
            });
        }
        let cancel = cancel_opt.unwrap_or_default();
        let shared = shared_opt.unwrap_or_default();

        let ip = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
            res = self.connector.resolve(&target.address) => {
                res.map_err(|e| ProbeError::UnresolvableAddress {
                    address: target.address.clone(),
                    reason: e.to_string(),
                })?
            }
        };

        // Dropping `probe_ports` on cancellation drops its JoinSet, which aborts every
        // in-flight attempt and closes its socket.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProbeError::Cancelled),
            res = self.probe_ports(ip, target, &shared) => res,
        }
    }

    async fn probe_ports(
        &self,
        ip: IpAddr,
        target: &ScanTarget,
        shared: &SharedProgress,
    ) -> Result<ScanResult, ProbeError> {
        let sem = Arc::new(Semaphore::new(self.config.effective_concurrency()));
        let timeout = self.config.per_attempt_timeout;
        let mut set = JoinSet::new();
        let mut reports = Vec::with_capacity(target.port_count() as usize);

        for port in target.ports() {
            let permit = sem
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| ProbeError::Cancelled)?;
            let connector = self.connector.clone();
            let shared = shared.clone();

            set.spawn(async move {
                let _permit = permit; // keep permit until the attempt is classified
                let outcome = attempt(connector.as_ref(), SocketAddr::new(ip, port), timeout).await;
                let report = PortReport { port, outcome };
                shared.record(report);
                report
            });

            // Keep the set from growing to the size of the whole range.
            while let Some(res) = set.try_join_next() {
                reports.push(joined(res)?);
            }
        }

        while let Some(res) = set.join_next().await {
            reports.push(joined(res)?);
        }

        Ok(ScanResult::from_reports(reports))
    }
}

async fn attempt(connector: &dyn Connector, addr: SocketAddr, timeout: Duration) -> PortOutcome {
    match time::timeout(timeout, connector.connect(addr)).await {
        Ok(Ok(())) => PortOutcome::Open,
        // Refused, unreachable, or timed out.
        _ => PortOutcome::Closed,
    }
}

fn joined(res: Result<PortReport, JoinError>) -> Result<PortReport, ProbeError> {
    match res {
        Ok(report) => Ok(report),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(ProbeError::Cancelled),
    }
}
