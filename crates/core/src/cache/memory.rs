//! Host memory pressure classification and the cache sizing it drives.
//!
//! A [`MemoryProbe`] reports used/limit as a ratio; hosts that cannot
//! introspect memory report `None`, which classifies as [`MemoryPressure::Low`].

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Usage ratio above which pressure is high.
const HIGH_PRESSURE_RATIO: f64 = 0.8;

/// Usage ratio above which pressure is medium.
const MEDIUM_PRESSURE_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPressure {
    #[default]
    Low,
    Medium,
    High,
}

impl MemoryPressure {
    pub fn from_ratio(ratio: Option<f64>) -> Self {
        match ratio {
            Some(r) if r > HIGH_PRESSURE_RATIO => MemoryPressure::High,
            Some(r) if r > MEDIUM_PRESSURE_RATIO => MemoryPressure::Medium,
            _ => MemoryPressure::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryPressure::Low => "low",
            MemoryPressure::Medium => "medium",
            MemoryPressure::High => "high",
        }
    }
}

/// Source of the used-to-limit memory ratio.
pub trait MemoryProbe: Send + Sync {
    /// Current usage in `0.0..=1.0`, or `None` when unavailable.
    fn usage_ratio(&self) -> Option<f64>;
}

/// Reads `MemTotal` and `MemAvailable` from `/proc/meminfo`.
#[derive(Debug, Clone)]
pub struct ProcMeminfoProbe {
    path: PathBuf,
}

impl Default for ProcMeminfoProbe {
    fn default() -> Self {
        Self { path: PathBuf::from("/proc/meminfo") }
    }
}

impl ProcMeminfoProbe {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MemoryProbe for ProcMeminfoProbe {
    fn usage_ratio(&self) -> Option<f64> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => parse_meminfo_ratio(&content),
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "memory introspection unavailable");
                None
            }
        }
    }
}

/// Used/total ratio from `/proc/meminfo` content.
pub fn parse_meminfo_ratio(content: &str) -> Option<f64> {
    let field = |name: &str| {
        content
            .lines()
            .find(|line| line.starts_with(name))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|value| value.parse::<u64>().ok())
    };

    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    if total == 0 {
        return None;
    }

    Some(total.saturating_sub(available) as f64 / total as f64)
}

/// Probe for hosts without memory introspection.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableProbe;

impl MemoryProbe for UnavailableProbe {
    fn usage_ratio(&self) -> Option<f64> {
        None
    }
}

/// Probe whose reading is set by the embedder.
#[derive(Debug, Default)]
pub struct StaticProbe {
    ratio: Mutex<Option<f64>>,
}

impl StaticProbe {
    pub fn new(ratio: Option<f64>) -> Self {
        Self { ratio: Mutex::new(ratio) }
    }

    pub fn set(&self, ratio: Option<f64>) {
        *self.ratio.lock() = ratio;
    }
}

impl MemoryProbe for StaticProbe {
    fn usage_ratio(&self) -> Option<f64> {
        *self.ratio.lock()
    }
}

/// Best probe for the current platform.
pub fn default_probe() -> Arc<dyn MemoryProbe> {
    if cfg!(target_os = "linux") {
        Arc::new(ProcMeminfoProbe::default())
    } else {
        Arc::new(UnavailableProbe)
    }
}

/// Cache ceilings per pressure level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizingPolicy {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl Default for SizingPolicy {
    fn default() -> Self {
        Self { low: 10, medium: 5, high: 2 }
    }
}

impl SizingPolicy {
    pub fn ceiling(&self, pressure: MemoryPressure) -> usize {
        match pressure {
            MemoryPressure::Low => self.low,
            MemoryPressure::Medium => self.medium,
            MemoryPressure::High => self.high,
        }
    }

    /// Rising pressure trims immediately; returning to low only lifts the ceiling.
    pub fn trims_on(&self, pressure: MemoryPressure) -> bool {
        pressure != MemoryPressure::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "MemTotal:       16000000 kB\n\
                           MemFree:         1000000 kB\n\
                           MemAvailable:    4000000 kB\n\
                           Buffers:          200000 kB\n";

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(MemoryPressure::from_ratio(None), MemoryPressure::Low);
        assert_eq!(MemoryPressure::from_ratio(Some(0.2)), MemoryPressure::Low);
        assert_eq!(MemoryPressure::from_ratio(Some(0.5)), MemoryPressure::Low);
        assert_eq!(MemoryPressure::from_ratio(Some(0.51)), MemoryPressure::Medium);
        assert_eq!(MemoryPressure::from_ratio(Some(0.8)), MemoryPressure::Medium);
        assert_eq!(MemoryPressure::from_ratio(Some(0.81)), MemoryPressure::High);
    }

    #[test]
    fn test_parse_meminfo_ratio() {
        let ratio = parse_meminfo_ratio(MEMINFO).unwrap();
        assert!((ratio - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_meminfo_missing_fields() {
        assert!(parse_meminfo_ratio("MemTotal: 100 kB\n").is_none());
        assert!(parse_meminfo_ratio("").is_none());
        assert!(parse_meminfo_ratio("MemTotal: 0 kB\nMemAvailable: 0 kB\n").is_none());
    }

    #[test]
    fn test_missing_meminfo_file_is_low_pressure() {
        let probe = ProcMeminfoProbe::with_path("/nonexistent/meminfo");
        assert!(probe.usage_ratio().is_none());
        assert_eq!(MemoryPressure::from_ratio(probe.usage_ratio()), MemoryPressure::Low);
    }

    #[test]
    fn test_static_probe() {
        let probe = StaticProbe::new(None);
        assert!(probe.usage_ratio().is_none());
        probe.set(Some(0.9));
        assert_eq!(probe.usage_ratio(), Some(0.9));
    }

    #[test]
    fn test_sizing_policy() {
        let policy = SizingPolicy::default();
        assert_eq!(policy.ceiling(MemoryPressure::High), 2);
        assert_eq!(policy.ceiling(MemoryPressure::Medium), 5);
        assert_eq!(policy.ceiling(MemoryPressure::Low), 10);
        assert!(policy.trims_on(MemoryPressure::High));
        assert!(!policy.trims_on(MemoryPressure::Low));
    }
}
