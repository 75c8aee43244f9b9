// src/logging.rs
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_JSON: &str = "QST_LOG_JSON";

/// Install the global subscriber. `RUST_LOG` wins over `verbose`; set
/// `QST_LOG_JSON=1` for JSON lines on stderr. Safe to call twice.
pub fn init_logging(verbose: bool) {
    let fallback = if verbose {
        "qst_broadcast=debug,qst=debug,info"
    } else {
        "qst_broadcast=info,qst=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let json = std::env::var(ENV_LOG_JSON)
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
