use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable that overrides the log filter (e.g. `AUTOVOT_LOG=autovot=debug`).
pub const LOG_ENV_VAR: &str = "AUTOVOT_LOG";

/// Initialize structured JSON logging on stderr.
///
/// Uses `default_level` unless overridden by `AUTOVOT_LOG`. Stdout is left to the
/// prediction report. Safe to call more than once; only the first call installs anything.
pub fn init(default_level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_env_var(LOG_ENV_VAR)
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init(LevelFilter::WARN);
        init(LevelFilter::DEBUG);
    }
}
