//! Observability utilities for governance action services.

#![warn(missing_docs, clippy::pedantic)]

pub mod tracing_support {
    //! Structured tracing helpers.

    use anyhow::{Context, anyhow};
    use tracing_subscriber::EnvFilter;

    /// Installs a formatted subscriber filtered by `RUST_LOG`, falling back to
    /// `default_filter` when the variable is unset or unparsable.
    ///
    /// # Errors
    ///
    /// Returns an error when `default_filter` is not a valid filter directive or
    /// a global subscriber is already installed.
    pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(default_filter)
                .with_context(|| format!("invalid default log filter `{default_filter}`"))?,
        };

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
    }

}

pub mod spans {
    //! Span constructors shared by the kernel and engines.

    use action_primitives::{InvocationId, ServiceKind};
    use tracing::{Span, info_span};

    /// Span every invocation of `kind` runs inside.
    #[must_use]
    pub fn invocation_span(kind: &ServiceKind, invocation_id: InvocationId) -> Span {
        info_span!(
            "invocation",
            kind = %kind,
            invocation_id = %invocation_id,
        )
    }
}
