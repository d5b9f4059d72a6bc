//! Trusted reverse proxy ranges.
//!
//! `X-Forwarded-For` is client-controlled. When the service sits behind a
//! known proxy tier, list that tier's networks in `TRUSTED_PROXIES` and the
//! header is only honored on connections coming from them. With no ranges
//! configured every peer is trusted.

use std::net::IpAddr;
use std::str::FromStr;

use tracing::{debug, warn};

/// A network in CIDR notation, e.g. `10.0.0.0/8` or `::1/128`.
///
/// A bare address is accepted as a single-host range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrRange {
    network: IpAddr,
    prefix_len: u8,
}

impl CidrRange {
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Check whether `ip` lies inside this range.
    ///
    /// IPv4-mapped IPv6 peers (`::ffff:a.b.c.d`) are compared as IPv4.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip.to_canonical()) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = mask_u32(self.prefix_len);
                u32::from(net) & mask == u32::from(addr) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = mask_u128(self.prefix_len);
                u128::from(net) & mask == u128::from(addr) & mask
            }
            _ => false,
        }
    }
}

fn mask_u32(prefix_len: u8) -> u32 {
    u32::MAX.checked_shl(32 - u32::from(prefix_len)).unwrap_or(0)
}

fn mask_u128(prefix_len: u8) -> u128 {
    u128::MAX.checked_shl(128 - u32::from(prefix_len)).unwrap_or(0)
}

/// Error returned when a CIDR string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid CIDR range: {0}")]
pub struct InvalidCidr(String);

impl FromStr for CidrRange {
    type Err = InvalidCidr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || InvalidCidr(s.to_string());

        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };

        let network: IpAddr = addr.parse().map_err(|_| invalid())?;
        let max_prefix = if network.is_ipv4() { 32 } else { 128 };

        let prefix_len = match prefix {
            Some(p) => p.parse::<u8>().map_err(|_| invalid())?,
            None => max_prefix,
        };
        if prefix_len > max_prefix {
            return Err(invalid());
        }

        Ok(Self {
            network,
            prefix_len,
        })
    }
}

/// Set of proxy networks allowed to supply `X-Forwarded-For`.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    ranges: Vec<CidrRange>,
}

impl TrustedProxies {
    /// Build from configuration strings. Unparseable entries are logged and
    /// skipped.
    pub fn new(cidrs: &[String]) -> Self {
        let ranges: Vec<CidrRange> = cidrs
            .iter()
            .filter_map(|cidr| match cidr.parse() {
                Ok(range) => Some(range),
                Err(e) => {
                    warn!(error = %e, "Skipping entry in TRUSTED_PROXIES");
                    None
                }
            })
            .collect();

        if !ranges.is_empty() {
            debug!(count = ranges.len(), "Trusted proxy validation enabled");
        }

        Self { ranges }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ranges.is_empty()
    }

    /// Whether forwarding headers from `peer` should be believed.
    pub fn trusts(&self, peer: IpAddr) -> bool {
        !self.is_enabled() || self.ranges.iter().any(|range| range.contains(peer))
    }
}
