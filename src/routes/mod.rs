//! Route normalization, classification and anomaly detection
//!
//! Every function here is a pure computation over its inputs. Caller-supplied
//! patterns are compiled once into option structs so per-request work never
//! re-parses configuration.

pub mod classify;
pub mod filter;
pub mod grouping;
pub mod normalize;
pub mod pattern;
pub mod performance;
pub mod query;
pub mod recorder;
pub mod route_filters;
pub mod suspicious;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

pub use classify::{classify_route, RouteCategory, RouteClassification};
pub use filter::{filter_trackable_paths, is_trackable, FilterOptions};
pub use grouping::{group_similar_paths, GroupingOptions, GroupingStrategy, PathGroup};
pub use normalize::{normalize_dynamic_path, IdHeuristic, NormalizeOptions};
pub use pattern::PatternSet;
pub use performance::{
    analyze_path_performance, PatternStats, PerformanceOptions, PerformanceReport,
    PerformanceSample, SlowRoute,
};
pub use query::{analyze_query_parameters, QueryAnalysis, QueryOptions};
pub use recorder::PerformanceRecorder;
pub use route_filters::{build_route_filters, RouteFilter, RouteSpec};
pub use suspicious::{
    detect_suspicious_paths, suspicious_categories, SuspiciousCategory, SuspiciousOptions,
    SuspiciousPath, SuspiciousReport,
};

/// Errors raised while compiling caller-supplied route configuration
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown route category: {0}")]
    UnknownCategory(String),
}

/// Everything the route classifier needs, compiled once
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    pub filter: FilterOptions,
    pub normalize: NormalizeOptions,
    pub query: QueryOptions,
    pub grouping: GroupingOptions,
    pub suspicious: SuspiciousOptions,
    pub performance: PerformanceOptions,
}

/// Per-path verdict combining filtering, normalization and classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub trackable: bool,
    pub pattern: String,
    pub category: RouteCategory,
    pub suspicious_categories: BTreeSet<SuspiciousCategory>,
}

/// Route classifier bound to a compiled configuration
#[derive(Debug, Clone, Default)]
pub struct RouteClassifier {
    options: RouteOptions,
}

impl RouteClassifier {
    pub fn new(options: RouteOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RouteOptions {
        &self.options
    }

    /// Decide how a single request path is tracked
    ///
    /// The query string, if any, is ignored for the pattern and category.
    pub fn decide(&self, path: &str) -> RouteDecision {
        let base = pattern::strip_query(path);

        RouteDecision {
            trackable: is_trackable(path, &self.options.filter),
            pattern: normalize_dynamic_path(base, &self.options.normalize),
            category: classify_route(base).category,
            suspicious_categories: suspicious_categories(path, &self.options.suspicious),
        }
    }
}
