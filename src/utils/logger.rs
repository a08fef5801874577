use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding a full `EnvFilter` directive.
pub const LOG_ENV: &str = "DOCKERW_LOG";

/// Logs go to stderr; stdout is reserved for `--print` and help output.
pub fn init_cli_logger(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("dockerw=debug"))
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("dockerw=warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}
