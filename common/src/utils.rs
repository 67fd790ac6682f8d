// common/src/utils.rs
use std::str::FromStr;
use tracing::Level;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::FmtSubscriber;

/// Setup tracing for consistent logging across the gateway.
///
/// Unknown level names fall back to `INFO`.
pub fn setup_tracing(level: &str) -> Result<(), SetGlobalDefaultError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(level))
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}

/// Run `f` with a scoped `INFO` subscriber, for work that happens before
/// the configured level is known (loading the configuration itself).
pub fn with_bootstrap_tracing<T>(f: impl FnOnce() -> T) -> T {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::with_default(subscriber, f)
}

fn parse_level(level: &str) -> Level {
    Level::from_str(level).unwrap_or(Level::INFO)
}
