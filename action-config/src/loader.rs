//! Configuration loader implementations.

use std::num::NonZeroUsize;

use tracing::debug;

use crate::{ConfigError, ConfigResult, KernelConfig};

/// Environment variable overriding the invocation concurrency limit.
pub const MAX_CONCURRENCY_ENV: &str = "GOVERNANCE_ACTIONS_MAX_CONCURRENCY";
/// Environment variable enabling strict request parameter checking.
pub const STRICT_PARAMETERS_ENV: &str = "GOVERNANCE_ACTIONS_STRICT_PARAMETERS";

/// Builds a [`KernelConfig`] from a variable lookup, starting from defaults.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnv`] when a variable holds an unparsable value.
pub fn kernel_config_from<F>(lookup: F) -> ConfigResult<KernelConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = KernelConfig::default();

    let max_concurrency = match lookup(MAX_CONCURRENCY_ENV) {
        Some(raw) => raw
            .trim()
            .parse::<NonZeroUsize>()
            .map_err(|_| ConfigError::InvalidEnv {
                name: MAX_CONCURRENCY_ENV,
                value: raw.clone(),
            })?,
        None => defaults.max_concurrent_invocations(),
    };

    let strict = match lookup(STRICT_PARAMETERS_ENV) {
        Some(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidEnv {
            name: STRICT_PARAMETERS_ENV,
            value: raw.clone(),
        })?,
        None => defaults.strict_parameters(),
    };

    let config = KernelConfig::new(max_concurrency, strict);
    config.validate()?;
    debug!(?config, "kernel configuration loaded");
    Ok(config)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
