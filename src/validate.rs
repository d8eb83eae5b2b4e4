use std::net::{IpAddr, Ipv6Addr};

use crate::error::{Field, ScanError};

const MAX_HOSTNAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// True iff `port` fits in the TCP port space (0..=65535).
pub fn is_valid_port(port: i64) -> bool {
    (0..=i64::from(u16::MAX)).contains(&port)
}

/// Syntactic host check: an RFC 1123 hostname, an IPv4 literal or an IPv6
/// literal (bare or in brackets). Never touches the network.
pub fn is_valid_host(host: &str) -> bool {
    if host.is_empty() {
        return false;
    }

    if let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        return inner.parse::<Ipv6Addr>().is_ok();
    }
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }

    is_valid_hostname(host)
}

fn is_valid_hostname(host: &str) -> bool {
    let name = host.strip_suffix('.').unwrap_or(host);
    if name.is_empty() || name.len() > MAX_HOSTNAME_LEN {
        return false;
    }

    let labels: Vec<&str> = name.split('.').collect();
    if !labels.iter().all(|l| is_valid_label(l)) {
        return false;
    }

    // "10.0.0.256" is a broken address, not a name.
    labels
        .last()
        .is_some_and(|tld| !tld.bytes().all(|b| b.is_ascii_digit()))
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

pub fn validate_host(host: &str) -> Result<(), ScanError> {
    if is_valid_host(host) {
        Ok(())
    } else {
        Err(ScanError::invalid(
            Field::Host,
            format!("{host:?} is not a hostname or IP literal"),
        ))
    }
}

pub fn validate_port(field: Field, port: i64) -> Result<u16, ScanError> {
    u16::try_from(port)
        .map_err(|_| ScanError::invalid(field, format!("{port} is outside 0-65535")))
}
