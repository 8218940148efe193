use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the configured filter;
/// `verbose` lifts this crate to debug when neither asks for more.
pub fn init_logging(filter: &str, verbose: bool) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .map(EnvFilter::new)
        .unwrap_or_else(|| {
            if verbose {
                EnvFilter::new(format!("{},bandmeta=debug", filter))
            } else {
                EnvFilter::new(filter)
            }
        });

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose);

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
