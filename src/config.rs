//! Configuration
//!
//! Settings come from command-line flags with environment fallbacks; a `.env` file is loaded
//! first when present.

use std::time::Duration;

use clap::Args;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::{
    loyalty::{LoyaltyError, LoyaltyRates},
    pricing::currency_from_code,
};

/// Configuration errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// The configured currency is not supported.
    #[error("unsupported currency: {0}")]
    UnknownCurrency(String),

    /// The configured loyalty rates are invalid.
    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),
}

/// Backend API settings.
#[derive(Debug, Clone, Args)]
pub struct ApiConfig {
    /// Base URL of the order-management backend
    #[arg(long, env = "ORDERLY_API_URL", default_value = "http://localhost:8080/api")]
    pub api_url: String,

    /// Bearer token for the backend
    #[arg(long, env = "ORDERLY_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "ORDERLY_API_TIMEOUT_SECS", default_value_t = 10_u64)]
    pub api_timeout_secs: u64,
}

impl ApiConfig {
    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Pricing settings.
#[derive(Debug, Clone, Args)]
pub struct PricingConfig {
    /// ISO code of the working currency
    #[arg(long, env = "ORDERLY_CURRENCY", default_value = "VND")]
    pub currency: String,

    /// Spend, in minor units, that earns one block of loyalty points
    #[arg(long, env = "ORDERLY_REWARD_MONEY_PER_POINT", default_value_t = 100_000_i64)]
    pub reward_money_per_point: i64,

    /// Loyalty points earned per block of spend
    #[arg(long, env = "ORDERLY_REWARD_POINT_PER_MONEY", default_value_t = 10_u32)]
    pub reward_point_per_money: u32,
}

impl PricingConfig {
    /// The working currency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCurrency`] if the code is not supported.
    pub fn currency(&self) -> Result<&'static Currency, ConfigError> {
        currency_from_code(&self.currency)
            .ok_or_else(|| ConfigError::UnknownCurrency(self.currency.clone()))
    }

    /// Loyalty rates in the working currency.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the currency or either rate is invalid.
    pub fn loyalty_rates(&self) -> Result<LoyaltyRates<'static>, ConfigError> {
        let currency = self.currency()?;

        Ok(LoyaltyRates::new(
            Money::from_minor(self.reward_money_per_point, currency),
            self.reward_point_per_money,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rusty_money::iso::{USD, VND};
    use testresult::TestResult;

    use super::*;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        api: ApiConfig,

        #[command(flatten)]
        logging: LoggingConfig,

        #[command(flatten)]
        pricing: PricingConfig,
    }

    #[test]
    fn flags_override_defaults() -> TestResult {
        let cli = TestCli::try_parse_from([
            "orderly",
            "--api-url",
            "https://shop.example/api",
            "--api-timeout-secs",
            "3",
            "--log-format",
            "json",
            "--currency",
            "usd",
            "--reward-money-per-point",
            "1000",
        ])?;

        assert_eq!(cli.api.api_url, "https://shop.example/api");
        assert_eq!(cli.api.timeout(), Duration::from_secs(3));
        assert_eq!(cli.logging.log_format, LogFormat::Json);
        assert_eq!(cli.pricing.currency()?, USD);
        assert_eq!(
            cli.pricing.loyalty_rates()?.reward_money_per_point(),
            Money::from_minor(1_000, USD)
        );

        Ok(())
    }

    #[test]
    fn default_loyalty_rates() -> TestResult {
        let pricing = PricingConfig {
            currency: "VND".to_string(),
            reward_money_per_point: 100_000,
            reward_point_per_money: 10,
        };

        let rates = pricing.loyalty_rates()?;

        assert_eq!(rates.reward_money_per_point(), Money::from_minor(100_000, VND));
        assert_eq!(rates.reward_point_per_money(), 10);

        Ok(())
    }

    #[test]
    fn unknown_currency_is_rejected() {
        let pricing = PricingConfig {
            currency: "XYZ".to_string(),
            reward_money_per_point: 100_000,
            reward_point_per_money: 10,
        };

        assert_eq!(
            pricing.currency(),
            Err(ConfigError::UnknownCurrency("XYZ".to_string()))
        );
    }

    #[test]
    fn zero_point_rate_is_rejected() {
        let pricing = PricingConfig {
            currency: "VND".to_string(),
            reward_money_per_point: 100_000,
            reward_point_per_money: 0,
        };

        assert_eq!(
            pricing.loyalty_rates(),
            Err(ConfigError::Loyalty(LoyaltyError::InvalidPointRate))
        );
    }
}
