use std::sync::Once;

/// Logger configuration.
///
/// `filter` follows the `env_logger` filter syntax, which also covers
/// per-subsystem levels (e.g. "info,quadrille_engine::render=debug").
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Explicit filter; when absent, `RUST_LOG` applies, then the default.
    pub filter: Option<String>,
}

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// Idempotent; subsequent calls are ignored. Intended usage is early in
/// `main`, before any subsystem logs.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
        }

        builder.init();

        log::debug!("logging initialized");
    });
}
