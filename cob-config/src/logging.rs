use anyhow::anyhow;
use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|err| anyhow!("invalid log filter {default_filter:?}: {err}"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|err| anyhow!("tracing already initialised: {err}"))
}
