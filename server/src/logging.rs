use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Sets up the global tracing subscriber.
///
/// Production uses a JSON format for structured logging, development a
/// human-readable one. Log levels are controlled by the `RUST_LOG` environment
/// variable.
pub fn setup_tracing(is_production: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if is_production {
            "info".into()
        } else {
            "cors_relay=debug,reqwest=debug".into()
        }
    });

    let subscriber = tracing_subscriber::registry().with(filter);

    if is_production {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber.with(fmt::layer()).init();
    };
}
