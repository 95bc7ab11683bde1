//! One-way IP anonymization
//!
//! - `none`: address unchanged
//! - `partial`: IPv4 truncated to /24, IPv6 to /48
//! - `full`: IPv4 truncated to /16, IPv6 to /32

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Granularity at which low-order address bits are zeroed
///
/// Variants are ordered from finest to coarsest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AnonymizationLevel {
    None,
    #[default]
    Partial,
    Full,
}

impl AnonymizationLevel {
    /// Number of leading bits kept for an address family
    fn prefix_len(self, ip: &IpAddr) -> u32 {
        match (self, ip) {
            (Self::None, IpAddr::V4(_)) => 32,
            (Self::None, IpAddr::V6(_)) => 128,
            (Self::Partial, IpAddr::V4(_)) => 24,
            (Self::Partial, IpAddr::V6(_)) => 48,
            (Self::Full, IpAddr::V4(_)) => 16,
            (Self::Full, IpAddr::V6(_)) => 32,
        }
    }
}

/// Zero the low-order bits of an address according to `level`
pub fn anonymize_ip(ip: IpAddr, level: AnonymizationLevel) -> IpAddr {
    let keep = level.prefix_len(&ip);

    match ip {
        IpAddr::V4(addr) => {
            let mask = u32::MAX.checked_shl(32 - keep).unwrap_or(0);
            IpAddr::V4(Ipv4Addr::from(u32::from(addr) & mask))
        }
        IpAddr::V6(addr) => {
            let mask = u128::MAX.checked_shl(128 - keep).unwrap_or(0);
            IpAddr::V6(Ipv6Addr::from(u128::from(addr) & mask))
        }
    }
}

/// An address that has been truncated to at least `level`
///
/// Holds no reference to the original bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AnonymizedIp {
    addr: IpAddr,
    level: AnonymizationLevel,
}

impl AnonymizedIp {
    pub fn new(ip: IpAddr, level: AnonymizationLevel) -> Self {
        Self {
            addr: anonymize_ip(ip, level),
            level,
        }
    }

    /// Apply another level; the result is never finer than the current one
    pub fn reanonymize(self, level: AnonymizationLevel) -> Self {
        Self::new(self.addr, self.level.max(level))
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn level(&self) -> AnonymizationLevel {
        self.level
    }
}

impl fmt::Display for AnonymizedIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.addr, f)
    }
}
