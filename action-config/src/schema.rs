//! Strongly typed configuration schemas.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

const DEFAULT_MAX_CONCURRENT_INVOCATIONS: usize = 32;

/// Deployment-wide settings for the invocation kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelConfig {
    max_concurrent_invocations: NonZeroUsize,
    #[serde(default)]
    strict_parameters: bool,
}

impl KernelConfig {
    /// Creates a configuration.
    #[must_use]
    pub const fn new(max_concurrent_invocations: NonZeroUsize, strict_parameters: bool) -> Self {
        Self {
            max_concurrent_invocations,
            strict_parameters,
        }
    }

    /// Returns how many invocations may evaluate at the same time.
    #[must_use]
    pub const fn max_concurrent_invocations(self) -> NonZeroUsize {
        self.max_concurrent_invocations
    }

    /// Returns `true` when undeclared request parameters reject an invocation
    /// instead of only being logged.
    #[must_use]
    pub const fn strict_parameters(self) -> bool {
        self.strict_parameters
    }

    /// Returns a copy with strict parameter checking toggled.
    #[must_use]
    pub const fn with_strict_parameters(mut self, strict: bool) -> Self {
        self.strict_parameters = strict;
        self
    }

    /// Reads overrides from the process environment on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] when a variable cannot be parsed.
    pub fn from_env() -> ConfigResult<Self> {
        crate::loader::kernel_config_from(|name| std::env::var(name).ok())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the concurrency limit exceeds
    /// what the scheduler can hand out.
    pub fn validate(self) -> ConfigResult<()> {
        // tokio semaphores cap their permit count.
        if self.max_concurrent_invocations.get() > tokio_semaphore_limit() {
            return Err(ConfigError::Invalid(
                "max concurrent invocations exceeds the scheduler limit",
            ));
        }
        Ok(())
    }
}

const fn tokio_semaphore_limit() -> usize {
    usize::MAX >> 3
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_concurrent_invocations: NonZeroUsize::new(DEFAULT_MAX_CONCURRENT_INVOCATIONS)
                .unwrap_or(NonZeroUsize::MIN),
            strict_parameters: false,
        }
    }
}
