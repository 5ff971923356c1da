use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "RG_REPLACE_LOG";

/// Default directive for a `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "rg_replace=warn",
        1 => "rg_replace=info",
        2 => "rg_replace=debug",
        _ => "rg_replace=trace",
    }
}

/// Install the stderr subscriber. Returns false if one was already set.
pub fn init(verbosity: u8) -> bool {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false),
    );

    if subscriber.try_init().is_err() {
        return false;
    }

    tracing::debug!(verbosity, "tracing initialized");
    true
}
