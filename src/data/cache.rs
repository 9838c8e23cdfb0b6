//! Local data caching
//!
//! Caches daily series locally to reduce API calls and enable offline runs.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::{Bar, LabError, LabResult, VixBar};

/// Longest accepted cache lifetime (ten years)
pub const MAX_CACHE_AGE_HOURS: i64 = 24 * 365 * 10;

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory
    pub cache_dir: PathBuf,
    /// Maximum age before refresh (in hours)
    pub max_age_hours: i64,
    /// Whether to use cache
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./data/cache"),
            max_age_hours: 24,
            enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> LabResult<()> {
        if !(0..=MAX_CACHE_AGE_HOURS).contains(&self.max_age_hours) {
            return Err(LabError::config(format!(
                "data.cache.max_age_hours must be in 0..={}, got {}",
                MAX_CACHE_AGE_HOURS, self.max_age_hours
            )));
        }
        Ok(())
    }
}

/// Data cache manager
pub struct DataCache {
    config: CacheConfig,
}

impl DataCache {
    pub fn new(config: CacheConfig) -> LabResult<Self> {
        config.validate()?;
        if config.enabled && !config.cache_dir.exists() {
            fs::create_dir_all(&config.cache_dir)?;
        }

        Ok(Self { config })
    }

    /// Cache file for a symbol and data type. Characters like '^' are kept
    /// out of file names.
    fn cache_key(&self, symbol: &str, data_type: &str) -> PathBuf {
        let symbol: String = symbol
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.config.cache_dir.join(format!("{}_{}.json", symbol, data_type))
    }

    /// Check if cache is valid (exists and not expired)
    pub fn is_valid(&self, symbol: &str, data_type: &str) -> bool {
        if !self.config.enabled {
            return false;
        }

        let path = self.cache_key(symbol, data_type);
        if let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) {
            let modified: DateTime<Utc> = modified.into();
            return Duration::try_hours(self.config.max_age_hours)
                .is_some_and(|max_age| Utc::now() - modified < max_age);
        }

        false
    }

    /// Save any serializable value under (symbol, data_type)
    pub fn save<T: Serialize>(&self, symbol: &str, data_type: &str, value: &T) -> LabResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let path = self.cache_key(symbol, data_type);
        let json = serde_json::to_string(value).map_err(|e| LabError::serialization(e.to_string()))?;
        fs::write(&path, json)?;

        tracing::info!("Cached {} {} at {:?}", symbol, data_type, path);
        Ok(())
    }

    /// Load a cached value if present and fresh
    pub fn load<T: DeserializeOwned>(&self, symbol: &str, data_type: &str) -> LabResult<Option<T>> {
        if !self.is_valid(symbol, data_type) {
            return Ok(None);
        }

        let path = self.cache_key(symbol, data_type);
        let json = fs::read_to_string(&path)?;
        let value = serde_json::from_str(&json).map_err(|e| LabError::serialization(e.to_string()))?;

        tracing::info!("Loaded {} {} from cache", symbol, data_type);
        Ok(Some(value))
    }
}

/// Cached data fetcher - combines cache with live fetching
pub struct CachedFetcher {
    cache: DataCache,
}

impl CachedFetcher {
    pub fn new(config: CacheConfig) -> LabResult<Self> {
        Ok(Self {
            cache: DataCache::new(config)?,
        })
    }

    fn data_type(range: &str) -> String {
        format!("daily_{}", range)
    }

    /// Daily bars (from cache or fetch)
    pub fn get_bars(&self, symbol: &str, range: &str) -> LabResult<Vec<Bar>> {
        let data_type = Self::data_type(range);
        if let Some(bars) = self.cache.load(symbol, &data_type)? {
            return Ok(bars);
        }

        tracing::info!("Fetching fresh data for {}", symbol);
        let client = super::yahoo::YahooClient::new()?;
        let bars = client.daily_bars(symbol, range)?;

        self.cache.save(symbol, &data_type, &bars)?;
        Ok(bars)
    }

    /// Daily VIX closes (from cache or fetch)
    pub fn get_vix(&self, range: &str) -> LabResult<Vec<VixBar>> {
        Ok(self
            .get_bars(super::yahoo::VIX_SYMBOL, range)?
            .into_iter()
            .map(VixBar::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn cache_in(dir: &std::path::Path, enabled: bool) -> DataCache {
        DataCache::new(CacheConfig {
            cache_dir: dir.to_path_buf(),
            max_age_hours: 24,
            enabled,
        })
        .unwrap()
    }

    #[test]
    fn test_cache_operations() {
        let temp_dir = tempdir().unwrap();
        let cache = cache_in(temp_dir.path(), true);

        let bars = vec![
            Bar::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 472.65),
            Bar::new(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), 468.79),
        ];

        cache.save("^VIX", "daily_5y", &bars).unwrap();
        assert!(cache.is_valid("^VIX", "daily_5y"));
        assert!(temp_dir.path().join("_VIX_daily_5y.json").exists());

        let loaded: Option<Vec<Bar>> = cache.load("^VIX", "daily_5y").unwrap();
        assert_eq!(loaded, Some(bars));

        assert!(!cache.is_valid("SPY", "daily_5y"));
    }

    #[test]
    fn test_max_age_is_bounded() {
        let temp_dir = tempdir().unwrap();
        for hours in [-1, MAX_CACHE_AGE_HOURS + 1, i64::MAX] {
            let config = CacheConfig {
                cache_dir: temp_dir.path().to_path_buf(),
                max_age_hours: hours,
                enabled: true,
            };
            assert!(config.validate().is_err());
            assert!(DataCache::new(config).is_err());
        }

        let config = CacheConfig {
            cache_dir: temp_dir.path().to_path_buf(),
            max_age_hours: MAX_CACHE_AGE_HOURS,
            enabled: true,
        };
        let cache = DataCache::new(config).unwrap();
        cache.save("SPY", "daily_1y", &vec![1.0]).unwrap();
        assert!(cache.is_valid("SPY", "daily_1y"));
    }

    #[test]
    fn test_zero_max_age_always_refetches() {
        let temp_dir = tempdir().unwrap();
        let cache = DataCache::new(CacheConfig {
            cache_dir: temp_dir.path().to_path_buf(),
            max_age_hours: 0,
            enabled: true,
        })
        .unwrap();

        cache.save("SPY", "daily_1y", &vec![1.0]).unwrap();
        assert!(!cache.is_valid("SPY", "daily_1y"));
    }

    #[test]
    fn test_disabled_cache() {
        let temp_dir = tempdir().unwrap();
        let cache = cache_in(temp_dir.path(), false);

        cache.save("SPY", "daily_1y", &vec![1.0, 2.0]).unwrap();
        let loaded: Option<Vec<f64>> = cache.load("SPY", "daily_1y").unwrap();
        assert!(loaded.is_none());
    }
}
