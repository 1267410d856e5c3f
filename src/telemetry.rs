//! Logging setup

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_DIRECTIVE: &str = "automl_pipeline=info";

/// Install a formatting subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive`
///
/// Returns `false` when a global subscriber was already installed, so it is
/// safe to call from every test and binary entry point.
pub fn init_tracing(default_directive: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        init_tracing(DEFAULT_DIRECTIVE);
        assert!(!init_tracing("debug"));
    }
}
