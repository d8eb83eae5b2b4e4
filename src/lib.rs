//! Library crate for port-checker: TCP reachability probes, range scans and
//! the bounded worker pool they run on.
pub mod config;
pub mod error;
pub mod pool;
pub mod ports;
pub mod probe;
pub mod scanner;
pub mod types;
pub mod validate;

pub use config::ScannerConfig;
pub use error::{Field, ScanError};
pub use pool::{PoolHandle, PoolPhase, WorkerPool};
pub use probe::probe_port;
pub use scanner::{join_range, PortScanner, ProbeHandle};
pub use types::{ProbeResult, RangeResult};
pub use validate::{is_valid_host, is_valid_port};
