use std::sync::Once;

/// Crates whose info-level output drowns the embedding's own messages.
const GPU_STACK: [&str; 5] = ["wgpu_core", "wgpu_hal", "naga", "glutin", "winit"];

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info", "warn",
/// "inlay_engine=debug,wgpu_core=warn").
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    /// Caps the GPU stack's own crates at `warn` unless the filter names them.
    pub quiet_gpu_stack: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            quiet_gpu_stack: true,
        }
    }
}

impl LoggingConfig {
    /// The filter in effect: explicit, else `RUST_LOG`, else `info`.
    fn resolve_filter(&self) -> String {
        self.env_filter
            .clone()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .unwrap_or_else(|| "info".to_string())
    }

    /// GPU stack crates to cap, skipping any the filter already mentions.
    fn quieted(&self, filter: &str) -> Vec<&'static str> {
        if !self.quiet_gpu_stack {
            return Vec::new();
        }
        GPU_STACK
            .into_iter()
            .filter(|module| !filter.contains(*module))
            .collect()
    }
}

static INIT: Once = Once::new();

/// Installs an `env_logger` for the process, at most once.
///
/// Later calls do nothing. A logger the host already installed is kept; this
/// call then only notes it at debug level.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = config.resolve_filter();
        let mut builder = env_logger::Builder::new();

        for module in config.quieted(&filter) {
            builder.filter_module(module, log::LevelFilter::Warn);
        }
        builder.parse_filters(&filter);
        builder.write_style(config.write_style);

        if builder.try_init().is_err() {
            log::debug!("logger already installed by host");
            return;
        }

        log::debug!("logging initialized ({filter})");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_wins() {
        let config = LoggingConfig {
            env_filter: Some("inlay_engine=trace".into()),
            ..Default::default()
        };
        assert_eq!(config.resolve_filter(), "inlay_engine=trace");
    }

    #[test]
    fn named_crates_are_not_quieted() {
        let config = LoggingConfig::default();
        let quieted = config.quieted("info,wgpu_hal=debug");
        assert!(quieted.contains(&"wgpu_core"));
        assert!(!quieted.contains(&"wgpu_hal"));

        let loud = LoggingConfig {
            quiet_gpu_stack: false,
            ..Default::default()
        };
        assert!(loud.quieted("info").is_empty());
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_logging(LoggingConfig {
            env_filter: Some("warn".into()),
            ..Default::default()
        });
        init_logging(LoggingConfig::default());
        log::warn!("still alive");
    }
}
