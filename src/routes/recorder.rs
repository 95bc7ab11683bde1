//! Long-running per-pattern latency recorder
//!
//! Count, min, max and sum are exact. Median and percentiles come from a
//! fixed-size uniform reservoir per pattern, so memory stays bounded no
//! matter how many samples a pattern receives.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::normalize::normalize_dynamic_path;
use super::performance::{PatternStats, PerformanceOptions, PerformanceReport};

pub const DEFAULT_RESERVOIR_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct PatternAccumulator {
    count: u64,
    min: u64,
    max: u64,
    sum: u128,
    /// Insertion order tie-breaker for reports
    first_seen: u64,
    reservoir: Vec<u64>,
}

impl PatternAccumulator {
    fn new(first_seen: u64, capacity: usize) -> Self {
        Self {
            count: 0,
            min: u64::MAX,
            max: 0,
            sum: 0,
            first_seen,
            reservoir: Vec::with_capacity(capacity.min(64)),
        }
    }

    fn add(&mut self, duration_ms: u64, capacity: usize) {
        self.count += 1;
        self.min = self.min.min(duration_ms);
        self.max = self.max.max(duration_ms);
        self.sum += u128::from(duration_ms);

        if self.reservoir.len() < capacity {
            self.reservoir.push(duration_ms);
        } else {
            // Algorithm R: keep each of the `count` samples with equal probability
            let slot = rand::random_range(0..self.count);
            if let Some(kept) = usize::try_from(slot)
                .ok()
                .and_then(|slot| self.reservoir.get_mut(slot))
            {
                *kept = duration_ms;
            }
        }
    }

    fn stats(&self) -> PatternStats {
        let mut sorted = self.reservoir.clone();
        sorted.sort_unstable();
        PatternStats::from_parts(self.count, self.min, self.max, self.sum, &sorted)
    }
}

/// Concurrent latency recorder keyed by normalized route pattern
pub struct PerformanceRecorder {
    options: PerformanceOptions,
    capacity: usize,
    patterns: DashMap<String, PatternAccumulator>,
    sequence: AtomicU64,
}

impl PerformanceRecorder {
    pub fn new(options: PerformanceOptions) -> Self {
        Self::with_reservoir_capacity(options, DEFAULT_RESERVOIR_CAPACITY)
    }

    pub fn with_reservoir_capacity(options: PerformanceOptions, capacity: usize) -> Self {
        Self {
            options,
            capacity: capacity.max(1),
            patterns: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Record one request duration
    ///
    /// Returns the pattern the path was normalized to.
    pub fn record(&self, path: &str, duration_ms: u64) -> String {
        let pattern = normalize_dynamic_path(path, &self.options.normalize);
        let capacity = self.capacity;

        self.patterns
            .entry(pattern.clone())
            .or_insert_with(|| {
                let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
                PatternAccumulator::new(seq, capacity)
            })
            .add(duration_ms, capacity);

        pattern
    }

    /// Total samples recorded across all patterns
    pub fn sample_count(&self) -> u64 {
        self.patterns.iter().map(|entry| entry.value().count).sum()
    }

    /// Snapshot report without clearing recorded data
    pub fn report(&self) -> PerformanceReport {
        let mut snapshot: Vec<(u64, String, PatternStats)> = self
            .patterns
            .iter()
            .map(|entry| {
                let acc = entry.value();
                (acc.first_seen, entry.key().clone(), acc.stats())
            })
            .collect();
        self.build_report(&mut snapshot)
    }

    /// Report and clear everything recorded so far
    pub fn drain(&self) -> PerformanceReport {
        let keys: Vec<String> = self
            .patterns
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let mut snapshot = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some((pattern, acc)) = self.patterns.remove(&key) {
                snapshot.push((acc.first_seen, pattern, acc.stats()));
            }
        }

        debug!(patterns = snapshot.len(), "drained performance recorder");
        self.build_report(&mut snapshot)
    }

    fn build_report(&self, snapshot: &mut [(u64, String, PatternStats)]) -> PerformanceReport {
        snapshot.sort_by_key(|(seq, _, _)| *seq);
        PerformanceReport::from_stats(
            snapshot
                .iter()
                .map(|(_, pattern, stats)| (pattern.clone(), stats.clone())),
            &self.options,
        )
    }
}
