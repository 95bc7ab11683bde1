//! VPN / proxy likelihood from static address ranges
//!
//! Three independent signals are checked and a result is only reported as a
//! likely VPN when at least two of them agree.

use ipnet::IpNet;
use serde::Serialize;
use std::net::IpAddr;
use std::sync::OnceLock;

use crate::headers::trusted::parse_ranges;

const VOTES_REQUIRED: u8 = 2;

/// Exit ranges operated by commercial VPN providers
const VPN_RANGES: &[&str] = &[
    "185.65.134.0/24",
    "193.138.218.0/24",
    "185.159.156.0/22",
    "146.70.0.0/16",
    "2a03:1b20::/32",
];

/// Hosting and VPS providers
const HOSTING_RANGES: &[&str] = &[
    "104.131.0.0/16",
    "159.65.0.0/16",
    "167.99.0.0/16",
    "45.33.0.0/17",
    "139.162.0.0/16",
    "88.198.0.0/16",
    "116.202.0.0/16",
    "51.68.0.0/16",
    "185.65.132.0/22",
    "193.138.218.0/24",
    "146.70.0.0/16",
];

/// Cloud and colocation datacenters
const DATACENTER_RANGES: &[&str] = &[
    "3.0.0.0/9",
    "52.0.0.0/10",
    "54.144.0.0/12",
    "34.64.0.0/10",
    "35.184.0.0/13",
    "20.33.0.0/16",
    "40.74.0.0/15",
    "185.65.128.0/19",
    "2a03:1b20::/32",
];

struct RangeTables {
    vpn: Vec<IpNet>,
    hosting: Vec<IpNet>,
    datacenter: Vec<IpNet>,
}

fn tables() -> &'static RangeTables {
    static TABLES: OnceLock<RangeTables> = OnceLock::new();
    TABLES.get_or_init(|| RangeTables {
        vpn: parse_ranges(VPN_RANGES),
        hosting: parse_ranges(HOSTING_RANGES),
        datacenter: parse_ranges(DATACENTER_RANGES),
    })
}

fn in_any(ranges: &[IpNet], ip: &IpAddr) -> bool {
    ranges.iter().any(|net| net.contains(ip))
}

/// Individual heuristic outcomes and the combined vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VpnAssessment {
    pub is_vpn_likely: bool,
    pub known_vpn_range: bool,
    pub hosting_provider: bool,
    pub datacenter_range: bool,
    /// Number of heuristics that fired
    pub signals: u8,
}

/// Run the VPN heuristics against an address
pub fn detect_vpn_proxy(ip: IpAddr) -> VpnAssessment {
    let tables = tables();

    let known_vpn_range = in_any(&tables.vpn, &ip);
    let hosting_provider = in_any(&tables.hosting, &ip);
    let datacenter_range = in_any(&tables.datacenter, &ip);

    let signals = [known_vpn_range, hosting_provider, datacenter_range]
        .into_iter()
        .filter(|fired| *fired)
        .count() as u8;

    VpnAssessment {
        is_vpn_likely: signals >= VOTES_REQUIRED,
        known_vpn_range,
        hosting_provider,
        datacenter_range,
        signals,
    }
}
