use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "watercolor_engine=debug,wgpu_core=warn").
///
/// `quiet_gpu` caps the wgpu/naga crates at `warn` unless the filter names them
/// explicitly; their `info` output is one line per adapter probe.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    pub quiet_gpu: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            quiet_gpu: true,
        }
    }
}

impl LoggingConfig {
    /// Debug-level engine output, useful when tuning the frame scheduler.
    pub fn verbose() -> Self {
        Self {
            env_filter: Some("watercolor_engine=debug".to_string()),
            ..Self::default()
        }
    }
}

const GPU_CRATES: [&str; 4] = ["wgpu_core", "wgpu_hal", "wgpu", "naga"];

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// Idempotent; later calls are ignored. Call early in `main`.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        let filter = config
            .env_filter
            .clone()
            .or_else(|| std::env::var("RUST_LOG").ok());

        match filter.as_deref() {
            Some(filter) => {
                builder.parse_filters(filter);
            }
            None => {
                builder.filter_level(log::LevelFilter::Info);
            }
        }

        if config.quiet_gpu {
            let named = filter.as_deref().unwrap_or("");
            for krate in GPU_CRATES {
                if !named.contains(krate) {
                    builder.filter_module(krate, log::LevelFilter::Warn);
                }
            }
        }

        builder.write_style(config.write_style);
        builder.init();

        log::debug!("logging initialized");
    });
}
