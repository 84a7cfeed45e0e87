//! Environment configuration
//!
//! Read once at startup. `.env` is loaded by the binary before this runs.

use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::disposition::default_minimum_output;
use crate::error::SwapBotError;
use crate::gateway::fswap::DEFAULT_BASE_URL;
use crate::state::DEFAULT_SESSION_TTL;
use crate::swap::validate_minimum_output;
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// The bot's own account id
    pub bot_id: Uuid,
    pub swap_api_base_url: String,
    pub session_ttl: Duration,
    pub minimum_output: Decimal,
    pub max_in_flight: usize,
    pub api_port: u16,
    pub bus_retry_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot_id = get("BOT_CLIENT_ID")
            .ok_or_else(|| SwapBotError::Config("BOT_CLIENT_ID is not set".to_string()))?;
        let bot_id = Uuid::parse_str(bot_id.trim())
            .map_err(|e| SwapBotError::Config(format!("BOT_CLIENT_ID: {}", e)))?;

        let minimum_output = match get("SWAP_MINIMUM_OUTPUT") {
            Some(raw) => {
                let value = Decimal::from_str(raw.trim())
                    .map_err(|e| SwapBotError::Config(format!("SWAP_MINIMUM_OUTPUT: {}", e)))?;
                validate_minimum_output(value)
                    .map_err(|e| SwapBotError::Config(format!("SWAP_MINIMUM_OUTPUT: {}", e)))?
            }
            None => default_minimum_output(),
        };

        let api_port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => parse_number("PORT", &raw)?,
            None => 8080,
        };

        Ok(Self {
            bot_id,
            swap_api_base_url: get("SWAP_API_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            session_ttl: match get("SESSION_TTL_SECS") {
                Some(raw) => Duration::from_secs(parse_number("SESSION_TTL_SECS", &raw)?),
                None => DEFAULT_SESSION_TTL,
            },
            minimum_output,
            max_in_flight: match get("MAX_IN_FLIGHT") {
                Some(raw) => parse_number::<usize>("MAX_IN_FLIGHT", &raw)?.max(1),
                None => 1,
            },
            api_port,
            bus_retry_delay: Duration::from_millis(match get("BUS_RETRY_DELAY_MS") {
                Some(raw) => parse_number("BUS_RETRY_DELAY_MS", &raw)?,
                None => 1000,
            }),
        })
    }
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| SwapBotError::Config(format!("{}: {}", key, e)))
}
