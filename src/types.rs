use std::collections::BTreeMap;

use ::time::{format_description::well_known, OffsetDateTime};
use serde::{Deserialize, Serialize};

/// Outcome of a single connect attempt against host:port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub host: String,
    pub port: u16,
    pub is_open: bool,
}

impl ProbeResult {
    pub fn new(host: impl Into<String>, port: u16, is_open: bool) -> Self {
        Self {
            host: host.into(),
            port,
            is_open,
        }
    }
}

/// Per-port reachability for one host, keyed by port number.
///
/// A finished range scan holds exactly one entry per port of the scanned
/// inclusive range.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeResult {
    pub host: String,
    pub ports: BTreeMap<u16, bool>,
}

impl RangeResult {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ports: BTreeMap::new(),
        }
    }

    /// Record the state of `port`, replacing any earlier entry for it.
    pub fn add_port(&mut self, port: u16, is_open: bool) {
        self.ports.insert(port, is_open);
    }

    pub fn get(&self, port: u16) -> Option<bool> {
        self.ports.get(&port).copied()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Open ports in ascending order.
    pub fn open_ports(&self) -> Vec<u16> {
        self.ports
            .iter()
            .filter_map(|(&port, &open)| open.then_some(port))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = ProbeResult> + '_ {
        self.ports
            .iter()
            .map(|(&port, &open)| ProbeResult::new(self.host.as_str(), port, open))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    Sequential,
    Concurrent,
}

/// JSON document written by the CLI for a finished range scan.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanReport {
    pub host: String,
    pub start_port: u16,
    pub end_port: u16,
    pub mode: ScanMode,
    pub started_at: String,
    pub finished_at: String,
    pub open_count: usize,
    pub ports: BTreeMap<u16, bool>,
}

impl ScanReport {
    pub fn new(
        result: RangeResult,
        start_port: u16,
        end_port: u16,
        mode: ScanMode,
        started_at: String,
    ) -> Self {
        Self {
            open_count: result.open_ports().len(),
            host: result.host,
            start_port,
            end_port,
            mode,
            started_at,
            finished_at: now_rfc3339(),
            ports: result.ports,
        }
    }
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_result_keeps_fields() {
        let r = ProbeResult::new("localhost", 80, true);
        assert_eq!(r.host, "localhost");
        assert_eq!(r.port, 80);
        assert!(r.is_open);
    }

    #[test]
    fn adding_a_port_records_its_state() {
        let mut range = RangeResult::new("localhost");
        assert!(range.is_empty());
        range.add_port(80, true);
        range.add_port(22, false);
        range.add_port(80, true);
        assert_eq!(range.host, "localhost");
        assert_eq!(range.len(), 2);
        assert_eq!(range.get(80), Some(true));
        assert_eq!(range.get(22), Some(false));
        assert_eq!(range.get(443), None);
        assert_eq!(range.open_ports(), vec![80]);
    }

    #[test]
    fn report_counts_open_ports() {
        let mut range = RangeResult::new("10.0.0.1");
        for (port, open) in [(20, false), (21, true), (22, true)] {
            range.add_port(port, open);
        }
        let report = ScanReport::new(range, 20, 22, ScanMode::Concurrent, now_rfc3339());
        assert_eq!(report.open_count, 2);
        assert_eq!(report.ports.len(), 3);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "concurrent");
        assert_eq!(json["ports"]["21"], true);
    }
}
