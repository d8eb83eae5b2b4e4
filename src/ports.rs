use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// An inclusive port interval as typed by the user, e.g. `80` or `8000-8010`.
///
/// Bounds are kept as wide integers; range checking is left to the scanner so
/// that out-of-range values surface as its validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpan {
    pub start: i64,
    pub end: i64,
}

impl PortSpan {
    pub fn single(port: i64) -> Self {
        Self { start: port, end: port }
    }

    /// Number of ports covered, zero for a reversed span.
    pub fn len(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start) as u64 + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Both bounds narrowed to TCP port numbers.
    pub fn bounds(&self) -> Result<(u16, u16)> {
        let start = u16::try_from(self.start)
            .with_context(|| format!("start port out of range: {}", self.start))?;
        let end = u16::try_from(self.end)
            .with_context(|| format!("end port out of range: {}", self.end))?;
        Ok((start, end))
    }
}

impl fmt::Display for PortSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl FromStr for PortSpan {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_port_span(s)
    }
}

/// Parse `"<port>"` or `"<start>-<end>"`, ignoring surrounding whitespace.
pub fn parse_port_span(s: &str) -> Result<PortSpan> {
    let s = s.trim();
    if s.is_empty() {
        bail!("empty port specification");
    }

    if let Some((a, b)) = s.split_once('-') {
        let start = parse_port_number(a.trim())
            .with_context(|| format!("invalid start in range: {a}"))?;
        let end = parse_port_number(b.trim())
            .with_context(|| format!("invalid end in range: {b}"))?;
        return Ok(PortSpan { start, end });
    }

    let port = parse_port_number(s).with_context(|| format!("invalid port value: {s}"))?;
    Ok(PortSpan::single(port))
}

fn parse_port_number(s: &str) -> Result<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        bail!("not a port number: {s:?}");
    }
    s.parse::<i64>().map_err(|e| anyhow::anyhow!(e))
}
