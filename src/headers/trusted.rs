//! Trusted proxy allow-lists
//!
//! An allow-list entry is either a vendor name (`cloudflare`, `cloudfront`,
//! `fastly`), which expands to that vendor's published edge ranges, or a
//! literal IP address / CIDR block.

use ipnet::IpNet;
use std::net::IpAddr;

const CLOUDFLARE_RANGES: &[&str] = &[
    "173.245.48.0/20",
    "103.21.244.0/22",
    "103.22.200.0/22",
    "103.31.4.0/22",
    "141.101.64.0/18",
    "108.162.192.0/18",
    "190.93.240.0/20",
    "188.114.96.0/20",
    "197.234.240.0/22",
    "198.41.128.0/17",
    "162.158.0.0/15",
    "104.16.0.0/13",
    "104.24.0.0/14",
    "172.64.0.0/13",
    "131.0.72.0/22",
    "2400:cb00::/32",
    "2606:4700::/32",
    "2803:f800::/32",
    "2405:b500::/32",
    "2405:8100::/32",
    "2a06:98c0::/29",
    "2c0f:f248::/32",
];

const CLOUDFRONT_RANGES: &[&str] = &[
    "13.32.0.0/15",
    "13.224.0.0/14",
    "52.84.0.0/15",
    "54.182.0.0/16",
    "54.192.0.0/16",
    "54.230.0.0/16",
    "54.239.128.0/18",
    "99.84.0.0/16",
    "204.246.164.0/22",
    "205.251.192.0/19",
    "216.137.32.0/19",
    "2600:9000::/28",
];

const FASTLY_RANGES: &[&str] = &[
    "23.235.32.0/20",
    "43.249.72.0/22",
    "103.244.50.0/24",
    "103.245.222.0/23",
    "103.245.224.0/24",
    "104.156.80.0/20",
    "146.75.0.0/17",
    "151.101.0.0/16",
    "157.52.64.0/18",
    "167.82.0.0/17",
    "172.111.64.0/18",
    "185.31.16.0/22",
    "199.27.72.0/21",
    "199.232.0.0/16",
    "2a04:4e40::/32",
    "2a04:4e42::/32",
];

/// Published edge ranges for a known vendor name
pub(crate) fn vendor_ranges(vendor: &str) -> Option<&'static [&'static str]> {
    match vendor {
        "cloudflare" => Some(CLOUDFLARE_RANGES),
        "cloudfront" => Some(CLOUDFRONT_RANGES),
        "fastly" => Some(FASTLY_RANGES),
        _ => None,
    }
}

pub(crate) fn parse_ranges(ranges: &[&str]) -> Vec<IpNet> {
    ranges.iter().filter_map(|r| r.parse().ok()).collect()
}

fn host_network(ip: IpAddr) -> Option<IpNet> {
    let prefix = match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    IpNet::new(ip, prefix).ok()
}

/// A set of networks whose hops may appear in a forwarded chain
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    vendors: Vec<String>,
    networks: Vec<IpNet>,
}

impl TrustedProxies {
    /// Build an allow-list from vendor names, IP addresses and CIDR blocks
    ///
    /// Returns an error naming the first entry that is none of these.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> anyhow::Result<Self> {
        let mut trusted = Self::default();

        for entry in entries {
            let entry = entry.as_ref().trim();
            let lowered = entry.to_ascii_lowercase();

            if let Some(ranges) = vendor_ranges(&lowered) {
                trusted.networks.extend(parse_ranges(ranges));
                trusted.vendors.push(lowered);
            } else if let Ok(net) = entry.parse::<IpNet>() {
                trusted.networks.push(net.trunc());
            } else if let Some(net) = entry.parse::<IpAddr>().ok().and_then(host_network) {
                trusted.networks.push(net);
            } else {
                anyhow::bail!(
                    "unknown trusted proxy entry '{entry}': expected cloudflare, cloudfront, fastly, an IP address or a CIDR block"
                );
            }
        }

        Ok(trusted)
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.networks.iter().any(|net| net.contains(&ip))
    }

    /// Whether a vendor name was part of the allow-list
    pub fn trusts_vendor(&self, vendor: &str) -> bool {
        self.vendors.iter().any(|v| v == vendor)
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_names_expand_to_ranges() {
        let trusted = TrustedProxies::from_entries(&["cloudflare"]).unwrap();

        assert!(trusted.trusts_vendor("cloudflare"));
        assert!(trusted.contains("104.16.1.1".parse().unwrap()));
        assert!(trusted.contains("2606:4700::1".parse().unwrap()));
        assert!(!trusted.contains("8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn test_literal_ips_and_cidrs() {
        let trusted = TrustedProxies::from_entries(&["10.0.0.0/8", "192.0.2.10"]).unwrap();

        assert!(trusted.contains("10.20.30.40".parse().unwrap()));
        assert!(trusted.contains("192.0.2.10".parse().unwrap()));
        assert!(!trusted.contains("192.0.2.11".parse().unwrap()));
        assert!(!trusted.trusts_vendor("cloudflare"));
    }

    #[test]
    fn test_unknown_entry_is_rejected() {
        let err = TrustedProxies::from_entries(&["akamai"]).unwrap_err();
        assert!(err.to_string().contains("akamai"));
    }
}
