use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Initialize tracing for the process. Logs go to stderr so command output on
/// stdout stays clean.
///
/// `RUST_LOG` takes precedence over the configured level. Safe to call more
/// than once; later calls are no-ops.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = if config.log_json {
        builder.json().try_init()
    } else {
        builder.with_ansi(true).try_init()
    };
}
