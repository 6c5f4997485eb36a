//! User settings, read from a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AnalysisError;
use crate::types::AverageType;
use crate::utils::binning::DEFAULT_MAX_BUCKETS;
use crate::utils::{RangeBinner, TimeGranularity};

/// Heatmap area axis in 坪.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeatmapRange {
    pub min_area: f64,
    pub max_area: f64,
    pub interval: f64,
}

impl Default for HeatmapRange {
    fn default() -> Self {
        Self {
            min_area: 0.0,
            max_area: 100.0,
            interval: 5.0,
        }
    }
}

impl HeatmapRange {
    pub fn binner(&self, max_buckets: usize) -> Result<RangeBinner, AnalysisError> {
        Ok(RangeBinner::with_limit(
            self.min_area,
            self.max_area,
            self.interval,
            max_buckets,
        )?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Rows per page of the ranking table
    pub page_size: usize,
    pub heatmap: HeatmapRange,
    /// Price grid unit-price bucket width in 萬/坪
    pub unit_price_interval: f64,
    /// Price grid total-price bucket width in 萬
    pub total_price_interval: f64,
    pub average_type: AverageType,
    pub granularity: TimeGranularity,
    /// 萬/坪 per floor
    pub floor_premium: f64,
    /// Fetched datasets kept in memory
    pub cache_capacity: usize,
    pub max_buckets: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: 10,
            heatmap: HeatmapRange::default(),
            unit_price_interval: 5.0,
            total_price_interval: 500.0,
            average_type: AverageType::default(),
            granularity: TimeGranularity::default(),
            floor_premium: 0.0,
            cache_capacity: 8,
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }
}

impl Settings {
    /// Parse settings from a TOML file. Keys that are absent keep their defaults.
    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        let text = fs::read_to_string(path)
            .map_err(|e| AnalysisError::Config(format!("{}: {}", path.display(), e)))?;
        let settings: Settings = toml::from_str(&text)
            .map_err(|e| AnalysisError::Config(format!("{}: {}", path.display(), e)))?;
        settings.validate()?;
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// `<config dir>/presalestats/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("presalestats").join("config.toml"))
    }

    /// Load from [`Settings::default_path`] when that file exists, else use defaults.
    pub fn discover() -> Result<Self, AnalysisError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.page_size == 0 {
            return Err(AnalysisError::Config("page_size must be at least 1".into()));
        }
        if self.cache_capacity == 0 {
            return Err(AnalysisError::Config("cache_capacity must be at least 1".into()));
        }
        for (name, interval) in [
            ("unit_price_interval", self.unit_price_interval),
            ("total_price_interval", self.total_price_interval),
        ] {
            if !interval.is_finite() || interval <= 0.0 {
                return Err(AnalysisError::Config(format!("{} must be positive", name)));
            }
        }
        if !self.floor_premium.is_finite() {
            return Err(AnalysisError::Config("floor_premium must be finite".into()));
        }
        self.heatmap
            .binner(self.max_buckets)
            .map_err(|e| AnalysisError::Config(format!("heatmap: {}", e)))?;
        Ok(())
    }
}
