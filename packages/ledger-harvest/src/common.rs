use std::sync::OnceLock;

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a global tracing subscriber, at most once per process.
///
/// Without `verbose`, filtering comes from `RUST_LOG` with `info` as the
/// floor. With it, this crate and `local_crate_name` (usually the calling
/// binary) log at `debug`.
pub fn init_logger(verbose: bool, local_crate_name: Option<&str>) {
    static LOGGER_SETUP: OnceLock<()> = OnceLock::new();
    LOGGER_SETUP.get_or_init(|| {
        let env_filter = if verbose {
            let directives = match local_crate_name {
                None => format!("{}=debug,info", env!("CARGO_CRATE_NAME")),
                Some(name) => format!("{}=debug,{name}=debug,info", env!("CARGO_CRATE_NAME")),
            };
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .parse_lossy(directives)
        } else {
            EnvFilter::from_default_env().add_directive(Level::INFO.into())
        };

        tracing_subscriber::registry()
            .with(
                fmt::Layer::default()
                    .log_internal_errors(true)
                    .and_then(env_filter),
            )
            .init();
        tracing::info!("Initialized Logging");
    });
}
