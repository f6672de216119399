//! Process configuration from `SHOPFLOOR_*` environment variables.
//!
//! Unset variables fall back to defaults with a warning; a value that is set
//! but cannot be parsed is an error rather than a silent default.

use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use shopfloor_recipes::CurePolicy;

use crate::command_dispatcher::DEFAULT_MAX_RETRIES;

pub const LABOR_RATE_PER_HOUR: &str = "SHOPFLOOR_LABOR_RATE_PER_HOUR";
pub const DEFAULT_AMBIENT_TEMP_C: &str = "SHOPFLOOR_DEFAULT_AMBIENT_TEMP_C";
pub const CURE_REFERENCE_TEMP_C: &str = "SHOPFLOOR_CURE_REFERENCE_TEMP_C";
pub const CURE_COEFFICIENT: &str = "SHOPFLOOR_CURE_COEFFICIENT";
pub const CURE_FLOOR: &str = "SHOPFLOOR_CURE_FLOOR";
pub const CURE_CEILING: &str = "SHOPFLOOR_CURE_CEILING";
pub const DISPATCH_MAX_RETRIES: &str = "SHOPFLOOR_DISPATCH_MAX_RETRIES";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid cure policy: {0}")]
    CurePolicy(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopfloorConfig {
    pub labor_rate_per_hour: Decimal,
    pub default_ambient_temp_c: Decimal,
    pub cure_policy: CurePolicy,
    pub dispatch_max_retries: u32,
}

impl Default for ShopfloorConfig {
    fn default() -> Self {
        Self {
            labor_rate_per_hour: Decimal::from(25),
            default_ambient_temp_c: Decimal::from(20),
            cure_policy: CurePolicy::default(),
            dispatch_max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ShopfloorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let default_cure = CurePolicy::default();

        let labor_rate_per_hour = read(&lookup, LABOR_RATE_PER_HOUR, defaults.labor_rate_per_hour)?;
        if labor_rate_per_hour < Decimal::ZERO {
            return Err(ConfigError::Invalid {
                name: LABOR_RATE_PER_HOUR,
                value: labor_rate_per_hour.to_string(),
                reason: "must not be negative".to_string(),
            });
        }

        let cure_policy = CurePolicy::new(
            read(&lookup, CURE_REFERENCE_TEMP_C, default_cure.reference_temp_c())?,
            read(&lookup, CURE_COEFFICIENT, default_cure.coefficient_per_degree())?,
            read(&lookup, CURE_FLOOR, default_cure.floor())?,
            read(&lookup, CURE_CEILING, default_cure.ceiling())?,
        )
        .map_err(|e| ConfigError::CurePolicy(e.to_string()))?;

        Ok(Self {
            labor_rate_per_hour,
            default_ambient_temp_c: read(&lookup, DEFAULT_AMBIENT_TEMP_C, defaults.default_ambient_temp_c)?,
            cure_policy,
            dispatch_max_retries: read(&lookup, DISPATCH_MAX_RETRIES, defaults.dispatch_max_retries)?,
        })
    }
}

fn read<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + core::fmt::Display,
    T::Err: core::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => {
            tracing::warn!(variable = name, default = %default, "{name} not set; using default");
            Ok(default)
        }
    }
}
