use std::time::Duration;

use tokio::net::{lookup_host, TcpStream};
use tokio::time;
use tracing::{debug, trace};

use crate::error::{Field, ScanError};
use crate::types::ProbeResult;
use crate::validate::{validate_host, validate_port};

/// Attempt one TCP connect to `host:port`, bounded by `timeout`.
///
/// Invalid input fails with `InvalidArgument` before any socket is opened.
/// Every network-level failure (resolution, refusal, unreachable, timeout)
/// is reported as a closed port rather than an error.
pub async fn probe_port(host: &str, port: i64, timeout: Duration) -> Result<ProbeResult, ScanError> {
    validate_host(host)?;
    let port = validate_port(Field::Port, port)?;
    if timeout.is_zero() {
        return Err(ScanError::invalid(Field::SocketTimeout, "timeout must be positive"));
    }
    Ok(probe_validated(host, port, timeout).await)
}

/// Probe an already validated target.
pub(crate) async fn probe_validated(host: &str, port: u16, timeout: Duration) -> ProbeResult {
    let is_open = matches!(time::timeout(timeout, connect_any(host, port)).await, Ok(true));
    debug!(host, port, is_open, "probe finished");
    ProbeResult::new(host, port, is_open)
}

/// Try each resolved address in order; the stream is dropped on the way out.
async fn connect_any(host: &str, port: u16) -> bool {
    let name = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    let addrs = match lookup_host((name, port)).await {
        Ok(addrs) => addrs,
        Err(e) => {
            trace!(host, error = %e, "resolution failed");
            return false;
        }
    };

    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(_stream) => return true,
            Err(e) => trace!(%addr, error = %e, "connect failed"),
        }
    }
    false
}
