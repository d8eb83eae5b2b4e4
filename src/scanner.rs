use std::time::Duration;

use tracing::info;

use crate::config::ScannerConfig;
use crate::error::{Field, ScanError};
use crate::pool::{PoolHandle, PoolPhase, WorkerPool};
use crate::probe::probe_validated;
use crate::types::{ProbeResult, RangeResult};
use crate::validate::{self, validate_host, validate_port};

/// Handle to a probe running on the scanner's worker pool.
pub type ProbeHandle = PoolHandle<ProbeResult>;

/// TCP reachability scanner.
///
/// Blocking operations (`probe`, `scan_range`) await each connect attempt in
/// turn on the caller's task. The `*_async` variants validate their input,
/// queue one probe per port on a shared [`WorkerPool`] and return at once.
///
/// The socket timeout is fixed at construction; the pool size can be changed
/// but only takes effect after the next [`PortScanner::shutdown_now`].
#[derive(Debug)]
pub struct PortScanner {
    timeout: Duration,
    pool: WorkerPool,
}

impl PortScanner {
    pub fn new(config: ScannerConfig) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self {
            timeout: config.socket_timeout(),
            pool: WorkerPool::new(config.thread_pool_size)?,
        })
    }

    pub fn socket_timeout(&self) -> Duration {
        self.timeout
    }

    /// Pool size used by the next pool generation.
    pub fn pool_size(&self) -> usize {
        self.pool.configured_size()
    }

    pub fn set_pool_size(&self, size: usize) -> Result<(), ScanError> {
        self.pool.set_size(size)
    }

    pub fn pool_phase(&self) -> PoolPhase {
        self.pool.phase()
    }

    pub fn is_valid_host(&self, host: &str) -> bool {
        validate::is_valid_host(host)
    }

    pub fn is_valid_port(&self, port: i64) -> bool {
        validate::is_valid_port(port)
    }

    pub async fn probe(&self, host: &str, port: i64) -> Result<ProbeResult, ScanError> {
        validate_host(host)?;
        let port = validate_port(Field::Port, port)?;
        Ok(probe_validated(host, port, self.timeout).await)
    }

    pub fn probe_async(&self, host: &str, port: i64) -> Result<ProbeHandle, ScanError> {
        validate_host(host)?;
        let port = validate_port(Field::Port, port)?;
        Ok(self.spawn_probe(host.to_owned(), port))
    }

    /// Probe every port of `[start, end]` one after the other. A reversed
    /// range yields an empty result.
    pub async fn scan_range(&self, host: &str, start: i64, end: i64) -> Result<RangeResult, ScanError> {
        let (start, end) = validate_range(host, start, end)?;
        info!(host, start, end, "scanning range");

        let mut result = RangeResult::new(host);
        for port in start..=end {
            let probe = probe_validated(host, port, self.timeout).await;
            result.add_port(port, probe.is_open);
        }
        Ok(result)
    }

    /// Queue one pooled probe per port of `[start, end]` and return their
    /// handles without waiting for any of them.
    pub fn scan_range_async(&self, host: &str, start: i64, end: i64) -> Result<Vec<ProbeHandle>, ScanError> {
        let (start, end) = validate_range(host, start, end)?;
        info!(host, start, end, "scanning range on worker pool");

        Ok((start..=end)
            .map(|port| self.spawn_probe(host.to_owned(), port))
            .collect())
    }

    /// Fan the range out over the pool and collect the results.
    pub async fn scan_range_concurrent(&self, host: &str, start: i64, end: i64) -> Result<RangeResult, ScanError> {
        let handles = self.scan_range_async(host, start, end)?;
        join_range(host, handles).await
    }

    /// Abandon every queued and running pooled probe, wait for the workers to
    /// stop and continue with a fresh pool.
    pub async fn shutdown_now(&self) {
        self.pool.shutdown_now().await;
    }

    fn spawn_probe(&self, host: String, port: u16) -> ProbeHandle {
        let timeout = self.timeout;
        self.pool
            .submit(async move { probe_validated(&host, port, timeout).await })
    }
}

/// Await `handles` and gather them into a single result. Fails with
/// `Cancelled` if any probe was abandoned; no partial result is returned.
pub async fn join_range<I>(host: &str, handles: I) -> Result<RangeResult, ScanError>
where
    I: IntoIterator<Item = ProbeHandle>,
{
    let mut result = RangeResult::new(host);
    for handle in handles {
        let probe = handle.await?;
        result.add_port(probe.port, probe.is_open);
    }
    Ok(result)
}

fn validate_range(host: &str, start: i64, end: i64) -> Result<(u16, u16), ScanError> {
    validate_host(host)?;
    let start = validate_port(Field::StartPort, start)?;
    let end = validate_port(Field::EndPort, end)?;
    Ok((start, end))
}
