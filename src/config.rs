//! Environment-driven configuration.
//!
//! Values come from the process environment, with `.env` loaded by dotenvy
//! for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::estimate::calculators::MarginBasis;
use crate::estimate::rollup::EstimateSettings;

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ROLLUP_CACHE_TTL_SECS: u64 = 120;
const DEFAULT_ROLLUP_CACHE_CAPACITY: u64 = 500;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    /// Tax and default margins for task mapping rollups
    pub estimate: EstimateSettings,
    /// Margin basis for bid item totals
    pub bid_margin_basis: MarginBasis,
    pub rollup_cache_ttl: Duration,
    pub rollup_cache_capacity: u64,
}

impl Config {
    /// Load configuration from the environment (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let sales_tax_percent: Decimal =
            parse_or(&lookup, "SALES_TAX_PERCENT", Decimal::from(25))?;
        if sales_tax_percent.is_sign_negative() {
            return Err(ConfigError::Invalid {
                key: "SALES_TAX_PERCENT",
                value: sales_tax_percent.to_string(),
                reason: "must not be negative".to_string(),
            });
        }

        let estimate = EstimateSettings {
            sales_tax_percent,
            default_labor_gp_percent: parse_margin(&lookup, "DEFAULT_LABOR_GP_PERCENT")?,
            default_mat_gp_percent: parse_margin(&lookup, "DEFAULT_MAT_GP_PERCENT")?,
        };

        let bid_margin_basis = match lookup("BID_MARGIN_BASIS") {
            None => MarginBasis::default(),
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "on_cost" => MarginBasis::OnCost,
                "on_sell" => MarginBasis::OnSell,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "BID_MARGIN_BASIS",
                        value: raw,
                        reason: "expected on_cost or on_sell".to_string(),
                    })
                }
            },
        };

        Ok(Self {
            database_url,
            bind_addr: parse_or(&lookup, "BIND_ADDR", default_bind_addr())?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            estimate,
            bid_margin_basis,
            rollup_cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "ROLLUP_CACHE_TTL_SECS",
                DEFAULT_ROLLUP_CACHE_TTL_SECS,
            )?),
            rollup_cache_capacity: parse_or(
                &lookup,
                "ROLLUP_CACHE_CAPACITY",
                DEFAULT_ROLLUP_CACHE_CAPACITY,
            )?,
        })
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8090))
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_margin<F>(lookup: &F, key: &'static str) -> Result<Decimal, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let margin: Decimal = parse_or(lookup, key, Decimal::ZERO)?;
    if margin >= Decimal::ONE_HUNDRED {
        return Err(ConfigError::Invalid {
            key,
            value: margin.to_string(),
            reason: "margin must be below 100".to_string(),
        });
    }
    Ok(margin)
}
