// src/logging.rs

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `--debug` selects `debug`, else `info`.
/// Output is compact and timestamp-free since it is read by humans in a terminal.
pub fn init(debug: bool) {
    let fallback = if debug {
        format!("{}=debug,info", env!("CARGO_CRATE_NAME"))
    } else {
        "info".to_string()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .without_time()
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
