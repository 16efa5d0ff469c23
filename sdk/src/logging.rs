//! Tracing subscriber setup

/// Install a global fmt subscriber.
///
/// `RUST_LOG` overrides `level` when set. An already-installed global
/// subscriber is left in place, so applications may configure their own.
pub fn init_logging(level: &str) {
    let verbose = matches!(level, "debug" | "trace");

    let result = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .with_target(false)
        .with_line_number(verbose)
        .with_file(verbose)
        .try_init();

    match result {
        Ok(_) => {
            tracing::debug!("Logging initialized at level '{}'", level);
        }
        Err(_) => {
            // Global subscriber already set by the application
        }
    }
}
