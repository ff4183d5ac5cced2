use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

use log::debug;

use crate::error::Error;

const WWW_MARKER: &str = "www.";

/// Resolve a host name, a `www.` prefixed host name or an IPv4 literal to an
/// IPv4 address. Only the first IPv4 record is used.
pub fn resolve(input: &str) -> Result<Ipv4Addr, Error> {
    let host = strip_www(input);
    if host.is_empty() {
        return Err(resolution_error(input, "empty host name"));
    }

    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(ip);
    }

    let addrs = (host, 0)
        .to_socket_addrs()
        .map_err(|e| resolution_error(input, &e.to_string()))?;

    for addr in addrs {
        if let IpAddr::V4(ipv4) = addr.ip() {
            debug!("resolved {} to {}", host, ipv4);
            return Ok(ipv4);
        }
    }

    Err(resolution_error(input, "no ipv4 address found"))
}

// Everything up to and including the first "www." is dropped; text after a
// second occurrence is dropped as well.
fn strip_www(input: &str) -> &str {
    input.split(WWW_MARKER).nth(1).unwrap_or(input)
}

fn resolution_error(input: &str, reason: &str) -> Error {
    Error::Resolution {
        target: input.to_string(),
        reason: reason.to_string(),
    }
}
