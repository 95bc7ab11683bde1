use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::geo::{
    AnonymizationLevel, BuiltinGeolocator, CachedGeoResolver, GeoOptions, GeoResolver,
    IpGeolocator, MaxMindGeolocator,
};
use crate::headers::TrustedProxies;
use crate::routes::{
    FilterOptions, GroupingOptions, GroupingStrategy, IdHeuristic, NormalizeOptions,
    PatternSet, PerformanceOptions, QueryOptions, RouteError, RouteOptions, SuspiciousCategory,
    SuspiciousOptions,
};

const ENV_PREFIX: &str = "VANTAGE";

/// Keys read from the environment as comma-separated lists
const LIST_KEYS: &[&str] = &[
    "headers.trusted_proxies",
    "geo.trusted_proxies",
    "routes.exclude_patterns",
    "routes.include_patterns",
    "routes.id_patterns",
    "routes.exclude_params",
    "routes.categories",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub headers: HeaderConfig,
    pub geo: GeoConfig,
    pub routes: RouteConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Allow-list for forwarded hops; empty disables the hop check
    pub trusted_proxies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    pub ip_anonymization: AnonymizationLevel,
    pub country_only: bool,
    pub trust_proxy_headers: bool,
    pub trusted_proxies: Vec<String>,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: u64,
    /// Optional GeoLite2/GeoIP2 City database
    pub mmdb_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub exclude_patterns: Vec<String>,
    pub include_patterns: Vec<String>,
    pub max_length: usize,
    pub exclude_static_assets: bool,
    pub preserve_extensions: bool,
    pub max_segments: Option<usize>,
    pub id_patterns: Vec<String>,
    pub id_heuristic: bool,
    pub max_params: Option<usize>,
    pub exclude_params: Vec<String>,
    pub long_string_threshold: usize,
    pub min_group_size: usize,
    pub max_groups: Option<usize>,
    pub grouping_strategy: GroupingStrategy,
    pub slow_threshold_ms: u64,
    pub min_samples: usize,
    pub categories: Vec<SuspiciousCategory>,
    pub reservoir_capacity: usize,
}

impl Default for GeoConfig {
    fn default() -> Self {
        let defaults = GeoOptions::default();
        Self {
            ip_anonymization: defaults.ip_anonymization,
            country_only: defaults.country_only,
            trust_proxy_headers: defaults.trust_proxy_headers,
            trusted_proxies: defaults.trusted_proxies,
            cache_ttl_seconds: 3600,
            cache_max_entries: 10_000,
            mmdb_path: None,
        }
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: Vec::new(),
            include_patterns: Vec::new(),
            max_length: crate::routes::filter::DEFAULT_MAX_LENGTH,
            exclude_static_assets: true,
            preserve_extensions: false,
            max_segments: None,
            id_patterns: Vec::new(),
            id_heuristic: true,
            max_params: None,
            exclude_params: Vec::new(),
            long_string_threshold: crate::routes::query::DEFAULT_LONG_STRING_THRESHOLD,
            min_group_size: 1,
            max_groups: None,
            grouping_strategy: GroupingStrategy::Normalized,
            slow_threshold_ms: crate::routes::performance::DEFAULT_SLOW_THRESHOLD_MS,
            min_samples: 1,
            categories: SuspiciousCategory::ALL.to_vec(),
            reservoir_capacity: crate::routes::recorder::DEFAULT_RESERVOIR_CAPACITY,
        }
    }
}

impl HeaderConfig {
    /// Compiled hop allow-list, `None` when not configured
    pub fn trusted(&self) -> anyhow::Result<Option<TrustedProxies>> {
        if self.trusted_proxies.is_empty() {
            return Ok(None);
        }
        TrustedProxies::from_entries(&self.trusted_proxies)
            .context("Invalid headers.trusted_proxies")
            .map(Some)
    }
}

impl GeoConfig {
    pub fn options(&self) -> GeoOptions {
        GeoOptions {
            ip_anonymization: self.ip_anonymization,
            country_only: self.country_only,
            trust_proxy_headers: self.trust_proxy_headers,
            trusted_proxies: self
                .trusted_proxies
                .iter()
                .map(|p| p.trim().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Geolocator for IP lookups: the MaxMind database when configured,
    /// otherwise the builtin table
    pub fn geolocator(&self) -> anyhow::Result<Arc<dyn IpGeolocator>> {
        match &self.mmdb_path {
            Some(path) => {
                let geolocator = MaxMindGeolocator::open(path)?;
                tracing::info!("GeoIP database loaded from {}", path.display());
                Ok(Arc::new(geolocator))
            }
            None => Ok(Arc::new(BuiltinGeolocator)),
        }
    }

    pub fn resolver(&self) -> anyhow::Result<CachedGeoResolver> {
        let resolver = GeoResolver::with_geolocator(self.options(), self.geolocator()?);
        Ok(CachedGeoResolver::new(
            resolver,
            self.cache_max_entries,
            self.cache_ttl(),
        ))
    }
}

impl RouteConfig {
    /// Validate caller patterns and build the runtime option structs
    pub fn compile(&self) -> Result<RouteOptions, RouteError> {
        let normalize = NormalizeOptions {
            preserve_extensions: self.preserve_extensions,
            max_segments: self.max_segments,
            heuristic: IdHeuristic {
                enabled: self.id_heuristic,
                ..IdHeuristic::default()
            },
            id_patterns: Vec::new(),
        }
        .with_id_patterns(&self.id_patterns)?;

        Ok(RouteOptions {
            filter: FilterOptions {
                max_length: self.max_length,
                exclude_static_assets: self.exclude_static_assets,
                exclude: PatternSet::compile(&self.exclude_patterns)?,
                include: PatternSet::compile(&self.include_patterns)?,
            },
            query: QueryOptions {
                max_params: self.max_params,
                exclude_params: self.exclude_params.iter().cloned().collect(),
                long_string_threshold: self.long_string_threshold,
            },
            grouping: GroupingOptions {
                strategy: self.grouping_strategy,
                min_group_size: self.min_group_size,
                max_groups: self.max_groups,
                normalize: normalize.clone(),
            },
            suspicious: SuspiciousOptions {
                categories: self.categories.iter().copied().collect(),
            },
            performance: PerformanceOptions {
                min_samples: self.min_samples,
                slow_threshold_ms: self.slow_threshold_ms,
                normalize: normalize.clone(),
            },
            normalize,
        })
    }
}

impl Config {
    /// Load configuration from `.env`, an optional file and the environment
    ///
    /// Environment variables use the `VANTAGE_` prefix and `__` between
    /// sections, e.g. `VANTAGE_GEO__IP_ANONYMIZATION=full`. List values are
    /// comma separated.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let mut environment = ::config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",");
        for key in LIST_KEYS {
            environment = environment.with_list_parse_key(key);
        }

        let config = builder
            .add_source(environment)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize::<Config>()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `.env` and the environment only
    pub fn from_env() -> anyhow::Result<Self> {
        Self::load(None)
    }

    /// Check everything that would otherwise fail on first use
    pub fn validate(&self) -> anyhow::Result<()> {
        self.headers.trusted()?;
        self.routes
            .compile()
            .context("Invalid route configuration")?;
        Ok(())
    }
}
