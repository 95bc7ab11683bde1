//! Per-pattern latency statistics
//!
//! Percentiles use the rank position `p * n / 100 - 1` on the ascending
//! durations, interpolating linearly between neighbouring ranks. The
//! position is kept in hundredths so the arithmetic is exact for integer
//! durations.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::normalize::{normalize_dynamic_path, NormalizeOptions};

pub const DEFAULT_SLOW_THRESHOLD_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub path: String,
    pub duration_ms: u64,
}

impl PerformanceSample {
    pub fn new(path: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            path: path.into(),
            duration_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PerformanceOptions {
    pub min_samples: usize,
    /// Patterns whose mean exceeds this are slow
    pub slow_threshold_ms: u64,
    pub normalize: NormalizeOptions,
}

impl Default for PerformanceOptions {
    fn default() -> Self {
        Self {
            min_samples: 1,
            slow_threshold_ms: DEFAULT_SLOW_THRESHOLD_MS,
            normalize: NormalizeOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternStats {
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub avg: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
}

impl PatternStats {
    /// Exact statistics over every duration
    pub fn from_durations(mut durations: Vec<u64>) -> Option<Self> {
        durations.sort_unstable();
        let count = durations.len() as u64;
        let min = *durations.first()?;
        let max = *durations.last()?;
        let sum: u128 = durations.iter().map(|&d| u128::from(d)).sum();

        Some(Self::from_parts(count, min, max, sum, &durations))
    }

    /// Exact count/min/max/sum with order statistics taken from `sorted`,
    /// which may be a sample of the full population
    pub fn from_parts(count: u64, min: u64, max: u64, sum: u128, sorted: &[u64]) -> Self {
        let avg = if count == 0 { 0.0 } else { sum as f64 / count as f64 };

        Self {
            count,
            min,
            max,
            avg,
            median: median(sorted),
            p95: percentile(sorted, 95),
            p99: percentile(sorted, 99),
        }
    }
}

/// Middle value, or the mean of the two middle values for even lengths
pub fn median(sorted: &[u64]) -> f64 {
    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 1 => sorted[n / 2] as f64,
        _ => (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0,
    }
}

/// Interpolated percentile of ascending durations, `p` in whole percent
pub fn percentile(sorted: &[u64], p: u32) -> f64 {
    let (Some(&first), Some(&last)) = (sorted.first(), sorted.last()) else {
        return 0.0;
    };

    // Rank position in hundredths: p * n - 100
    let position = u64::from(p) * sorted.len() as u64;
    if position <= 100 {
        return first as f64;
    }
    let position = position - 100;
    let lower = (position / 100) as usize;
    let fraction = position % 100;

    match (sorted.get(lower), sorted.get(lower + 1)) {
        (Some(&low), Some(&high)) => {
            let spread = u128::from(high.saturating_sub(low)) * u128::from(fraction);
            low as f64 + spread as f64 / 100.0
        }
        (Some(&low), None) => low as f64,
        _ => last as f64,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowRoute {
    pub pattern: String,
    pub stats: PatternStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub total_patterns: usize,
    /// Stats per pattern, in first-seen order
    pub performance_groups: IndexMap<String, PatternStats>,
    pub slow_patterns: Vec<String>,
    /// Slow patterns, slowest mean first
    pub slowest_routes: Vec<SlowRoute>,
}

impl PerformanceReport {
    /// Apply `min_samples` and the slow threshold to computed stats
    pub fn from_stats(
        stats: impl IntoIterator<Item = (String, PatternStats)>,
        options: &PerformanceOptions,
    ) -> Self {
        let performance_groups: IndexMap<String, PatternStats> = stats
            .into_iter()
            .filter(|(_, s)| s.count >= options.min_samples as u64)
            .collect();

        let threshold = options.slow_threshold_ms as f64;
        let slow_patterns: Vec<String> = performance_groups
            .iter()
            .filter(|(_, s)| s.avg > threshold)
            .map(|(pattern, _)| pattern.clone())
            .collect();

        let mut slowest_routes: Vec<SlowRoute> = slow_patterns
            .iter()
            .filter_map(|pattern| {
                let stats = performance_groups.get(pattern)?.clone();
                Some(SlowRoute {
                    pattern: pattern.clone(),
                    stats,
                })
            })
            .collect();
        slowest_routes.sort_by(|a, b| {
            b.stats
                .avg
                .total_cmp(&a.stats.avg)
                .then_with(|| a.pattern.cmp(&b.pattern))
        });

        Self {
            total_patterns: performance_groups.len(),
            performance_groups,
            slow_patterns,
            slowest_routes,
        }
    }
}

/// Group samples by normalized pattern and summarize each group
pub fn analyze_path_performance(
    samples: &[PerformanceSample],
    options: &PerformanceOptions,
) -> PerformanceReport {
    let mut by_pattern: IndexMap<String, Vec<u64>> = IndexMap::new();
    for sample in samples {
        by_pattern
            .entry(normalize_dynamic_path(&sample.path, &options.normalize))
            .or_default()
            .push(sample.duration_ms);
    }

    let stats = by_pattern
        .into_iter()
        .filter_map(|(pattern, durations)| Some((pattern, PatternStats::from_durations(durations)?)));

    PerformanceReport::from_stats(stats, options)
}
