//! Process identity: host name, primary IP and build version.

use std::net::{Ipv4Addr, UdpSocket};

/// Fallback for identity values that cannot be determined.
pub const UNKNOWN: &str = "unknown";

/// Version reported when `APP_VERSION` is unset.
pub const DEFAULT_VERSION: &str = "dev";

/// The OS host name, then `HOSTNAME`, then [`UNKNOWN`].
pub fn host_name() -> String {
    hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().into_owned())
        .filter(|h| !h.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// IPv4 address of the interface used for outbound traffic.
///
/// Connecting a UDP socket sends nothing; it only selects a route.
pub fn host_ip() -> String {
    outbound_ipv4()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn outbound_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).ok()?;
    match socket.local_addr().ok()?.ip() {
        std::net::IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// `APP_VERSION`, or [`DEFAULT_VERSION`].
pub fn version() -> String {
    std::env::var("APP_VERSION")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_VERSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_name_is_never_empty() {
        assert!(!host_name().is_empty());
    }

    #[test]
    fn test_host_ip_is_ipv4_or_unknown() {
        let ip = host_ip();
        assert!(ip == UNKNOWN || ip.parse::<Ipv4Addr>().is_ok(), "got {}", ip);
    }
}
