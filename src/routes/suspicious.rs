//! Suspicious path detection
//!
//! Categories are independent; a path may collect several of them.

use regex::RegexSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Paths longer than this are malformed regardless of filter settings
pub const MALFORMED_LENGTH: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspiciousCategory {
    SecurityScan,
    BotBehavior,
    Malformed,
    ErrorProne,
}

impl SuspiciousCategory {
    pub const ALL: [SuspiciousCategory; 4] = [
        SuspiciousCategory::SecurityScan,
        SuspiciousCategory::BotBehavior,
        SuspiciousCategory::Malformed,
        SuspiciousCategory::ErrorProne,
    ];
}

const SECURITY_SCAN: &[&str] = &[
    r"\.\.[/\\]",
    r"(?i)%2e%2e(?:%2f|%5c|/)",
    r"(?i)/wp-(?:admin|login|content|includes)",
    r"(?i)/xmlrpc\.php",
    r"(?i)/phpmyadmin",
    r"(?i)/\.(?:env|git|svn|hg|htaccess|htpasswd|aws|ssh|ds_store)(?:/|$)",
    r"(?i)/etc/(?:passwd|shadow|hosts)",
    r"(?i)/cgi-bin/",
    r"(?i)/(?:config|configuration|settings|database|db)\.(?:php|inc|yml|yaml|ini|json|bak)$",
    r"(?i)/web\.config$",
    r"(?i)\.(?:sql|bak|old|swp)$",
    r"(?i)/id_(?:rsa|dsa|ecdsa|ed25519)",
    r"(?i)/(?:actuator|server-status|boaform|HNAP1)(?:/|$)",
];

const BOT_BEHAVIOR: &[&str] = &[
    r"(?i)^/robots\.txt$",
    r"(?i)/sitemap[^/]*\.xml(?:\.gz)?$",
    r"(?i)/(?:feed|rss|atom)(?:/|\.xml|$)",
    r"(?i)\.(?:rss|atom)$",
    r"(?i)^/(?:ads|humans|security)\.txt$",
    r"(?i)^/\.well-known/security\.txt$",
    r"(?i)/crawl(?:er)?(?:/|$)",
];

const ERROR_PRONE: &[&str] = &[
    r"/(?:undefined|null|NaN)(?:/|$)",
    r"(?i)\[object(?:%20| )object\]",
    r"(?i)%5bobject(?:%20| )object%5d",
    r"^/(?:4\d\d|5\d\d)(?:/|$)",
    r"(?i)^/(?:error|errors)/\d{3}(?:/|$)",
];

struct Rules {
    security_scan: RegexSet,
    bot_behavior: RegexSet,
    error_prone: RegexSet,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| Rules {
        security_scan: RegexSet::new(SECURITY_SCAN).unwrap_or_else(|_| RegexSet::empty()),
        bot_behavior: RegexSet::new(BOT_BEHAVIOR).unwrap_or_else(|_| RegexSet::empty()),
        error_prone: RegexSet::new(ERROR_PRONE).unwrap_or_else(|_| RegexSet::empty()),
    })
}

fn is_malformed(path: &str) -> bool {
    path.is_empty()
        || !path.starts_with('/')
        || path.len() > MALFORMED_LENGTH
        || path.contains("//")
        || path.chars().any(|c| c.is_whitespace() || c.is_control())
        || path.to_ascii_lowercase().contains("%00")
}

fn matches(path: &str, category: SuspiciousCategory) -> bool {
    let rules = rules();
    match category {
        SuspiciousCategory::SecurityScan => rules.security_scan.is_match(path),
        SuspiciousCategory::BotBehavior => rules.bot_behavior.is_match(path),
        SuspiciousCategory::Malformed => is_malformed(path),
        SuspiciousCategory::ErrorProne => rules.error_prone.is_match(path),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspiciousOptions {
    /// Rule sets to run
    pub categories: BTreeSet<SuspiciousCategory>,
}

impl Default for SuspiciousOptions {
    fn default() -> Self {
        Self {
            categories: SuspiciousCategory::ALL.into_iter().collect(),
        }
    }
}

/// Categories a single path falls into
pub fn suspicious_categories(path: &str, options: &SuspiciousOptions) -> BTreeSet<SuspiciousCategory> {
    options
        .categories
        .iter()
        .copied()
        .filter(|category| matches(path, *category))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuspiciousPath {
    pub path: String,
    pub categories: BTreeSet<SuspiciousCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuspiciousReport {
    pub total_paths: usize,
    pub suspicious_paths: usize,
    /// Share of flagged paths, rounded to two decimals
    pub suspicious_percentage: f64,
    pub details: Vec<SuspiciousPath>,
}

pub fn detect_suspicious_paths<S: AsRef<str>>(paths: &[S], options: &SuspiciousOptions) -> SuspiciousReport {
    let details: Vec<SuspiciousPath> = paths
        .iter()
        .map(AsRef::as_ref)
        .filter_map(|path| {
            let categories = suspicious_categories(path, options);
            (!categories.is_empty()).then(|| SuspiciousPath {
                path: path.to_string(),
                categories,
            })
        })
        .collect();

    let total_paths = paths.len();
    let suspicious_percentage = if total_paths == 0 {
        0.0
    } else {
        (details.len() as f64 / total_paths as f64 * 10_000.0).round() / 100.0
    };

    SuspiciousReport {
        total_paths,
        suspicious_paths: details.len(),
        suspicious_percentage,
        details,
    }
}
