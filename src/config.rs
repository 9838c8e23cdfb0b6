//! Run configuration
//!
//! One TOML file drives every stage of the pipeline. Every table is
//! optional; missing keys take the preset of the file's `underlying`
//! (SPY when absent). The SPY preset reproduces the reference study (5 years
//! of daily data, monthly 30-day ATM straddle, hedged run with a 50 share
//! band).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analytics::AnalyticsConfig;
use crate::core::{ContractSpec, LabError, LabResult};
use crate::data::CacheConfig;
use crate::execution::{ExecutionParams, LegOrder};
use crate::models::SigmaProxyParams;
use crate::strategy::{HedgeParams, PricingParams, StraddleParams};

/// Underlying the study is run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Underlying {
    #[default]
    Spy,
    Spx,
}

impl Underlying {
    pub fn contract(&self) -> ContractSpec {
        match self {
            Underlying::Spy => ContractSpec::spy(),
            Underlying::Spx => ContractSpec::spx(),
        }
    }
}

impl FromStr for Underlying {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SPY" => Ok(Underlying::Spy),
            "SPX" => Ok(Underlying::Spx),
            other => Err(LabError::invalid_input(format!(
                "underlying must be SPY or SPX, got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Underlying {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Underlying::Spy => write!(f, "SPY"),
            Underlying::Spx => write!(f, "SPX"),
        }
    }
}

/// Where daily closes come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    #[default]
    Yahoo,
    Csv,
}

/// Market data settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub source: DataSource,
    /// Yahoo history range ("1y", "5y", "max")
    pub range: String,
    /// Underlying closes when `source = "csv"`
    pub underlying_csv: Option<PathBuf>,
    /// VIX closes when `source = "csv"`
    pub vix_csv: Option<PathBuf>,
    pub cache: CacheConfig,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: DataSource::Yahoo,
            range: "5y".to_string(),
            underlying_csv: None,
            vix_csv: None,
            cache: CacheConfig::default(),
        }
    }
}

impl DataConfig {
    /// Read both series from local files
    pub fn from_csv(underlying: impl Into<PathBuf>, vix: impl Into<PathBuf>) -> Self {
        Self {
            source: DataSource::Csv,
            underlying_csv: Some(underlying.into()),
            vix_csv: Some(vix.into()),
            ..Default::default()
        }
    }
}

/// Inputs of the delta-neutral comparison. Missing spot/sigma are taken from
/// the last priced day of the backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeltaNeutralConfig {
    pub spot: Option<f64>,
    pub sigma: Option<f64>,
    pub days_to_expiry: f64,
}

impl Default for DeltaNeutralConfig {
    fn default() -> Self {
        Self {
            spot: None,
            sigma: None,
            days_to_expiry: 30.0,
        }
    }
}

/// Full run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    pub underlying: Underlying,
    pub out_dir: PathBuf,
    pub initial_cash: f64,
    pub leg_order: LegOrder,
    pub data: DataConfig,
    pub sigma: SigmaProxyParams,
    pub straddle: StraddleParams,
    pub pricing: PricingParams,
    /// Hedge settings of the hedged run; the base run never hedges
    pub hedge: HedgeParams,
    pub analytics: AnalyticsConfig,
    pub execution: ExecutionParams,
    pub delta_neutral: DeltaNeutralConfig,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self::spy()
    }
}

impl LabConfig {
    /// SPY study: $1 strikes, 50 share hedge band
    pub fn spy() -> Self {
        let contract = ContractSpec::spy();
        Self {
            underlying: Underlying::Spy,
            out_dir: PathBuf::from("outputs/results"),
            initial_cash: 100_000.0,
            leg_order: LegOrder::CallThenPut,
            data: DataConfig::default(),
            sigma: SigmaProxyParams::default(),
            straddle: StraddleParams::for_contract(&contract),
            pricing: PricingParams::default(),
            hedge: HedgeParams::delta_neutral(50.0),
            analytics: AnalyticsConfig::default(),
            execution: ExecutionParams {
                n_sims: 3000,
                seed: 42,
                ..Default::default()
            },
            delta_neutral: DeltaNeutralConfig::default(),
        }
    }

    /// SPX study: $5 strikes. An SPX contract carries ~10x the SPY delta, so
    /// the hedge band scales with it.
    pub fn spx() -> Self {
        let contract = ContractSpec::spx();
        Self {
            underlying: Underlying::Spx,
            straddle: StraddleParams::for_contract(&contract),
            hedge: HedgeParams::delta_neutral(500.0),
            initial_cash: 1_000_000.0,
            ..Self::spy()
        }
    }

    /// Preset for an underlying
    pub fn for_underlying(underlying: Underlying) -> Self {
        match underlying {
            Underlying::Spy => Self::spy(),
            Underlying::Spx => Self::spx(),
        }
    }

    pub fn contract(&self) -> ContractSpec {
        self.underlying.contract()
    }

    /// Parse from TOML text and validate.
    ///
    /// Keys present in the text are laid over the preset of its
    /// `underlying`, so `underlying = "SPX"` alone gives the SPX study.
    pub fn from_toml_str(text: &str) -> LabResult<Self> {
        let invalid = |e: &dyn fmt::Display| LabError::config(format!("Invalid config: {}", e));

        let mut overrides: toml::Table = text.parse().map_err(|e| invalid(&e))?;
        let underlying = match overrides.get("underlying") {
            Some(value) => value
                .as_str()
                .ok_or_else(|| LabError::config("underlying must be a string"))?
                .parse::<Underlying>()
                .map_err(|e| invalid(&e))?,
            None => Underlying::default(),
        };
        overrides.insert("underlying".to_string(), toml::Value::String(underlying.to_string()));
        tracing::debug!("Config defaults from the {} preset", underlying);

        let mut merged = toml::Value::try_from(Self::for_underlying(underlying))
            .map_err(|e| LabError::serialization(e.to_string()))?;
        merge_toml(&mut merged, toml::Value::Table(overrides));

        let config: LabConfig = merged.try_into().map_err(|e| invalid(&e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_toml_file(path: &Path) -> LabResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| LabError::config(format!("Cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> LabResult<String> {
        toml::to_string_pretty(self).map_err(|e| LabError::serialization(e.to_string()))
    }

    pub fn validate(&self) -> LabResult<()> {
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(LabError::config(format!("initial_cash must be positive, got {}", self.initial_cash)));
        }
        self.straddle.validate()?;
        self.data.cache.validate()?;
        if !(self.pricing.days_in_year > 0.0) {
            return Err(LabError::config("pricing.days_in_year must be positive"));
        }
        if self.hedge.rebalance_threshold < 0.0 {
            return Err(LabError::config("hedge.rebalance_threshold cannot be negative"));
        }
        if self.analytics.rolling_vol_window < 2 {
            return Err(LabError::config("analytics.rolling_vol_window must be at least 2"));
        }
        if self.execution.n_sims == 0 {
            return Err(LabError::config("execution.n_sims must be at least 1"));
        }
        if self.data.source == DataSource::Csv
            && (self.data.underlying_csv.is_none() || self.data.vix_csv.is_none())
        {
            return Err(LabError::config(
                "data.source = \"csv\" needs data.underlying_csv and data.vix_csv",
            ));
        }
        Ok(())
    }
}

/// Recursively lay `overlay` over `base`; tables merge, other values replace
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_toml(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
