use std::sync::Once;

use log::LevelFilter;

/// Logger configuration.
///
/// `env_filter` uses the `env_logger` directive syntax
/// (`"info"`, `"ishtar_engine::splat=debug,wgpu_core=warn"`) and wins over
/// `RUST_LOG`. Without either, `level` applies globally and the GPU stack is
/// capped at `gpu_level`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub level: LevelFilter,
    /// Cap for `wgpu_core`, `wgpu_hal` and `naga`.
    pub gpu_level: LevelFilter,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            level: LevelFilter::Info,
            gpu_level: LevelFilter::Warn,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    /// Debug output from the engine, GPU stack still capped.
    pub fn verbose() -> Self {
        Self {
            level: LevelFilter::Debug,
            ..Self::default()
        }
    }

    /// The filter string this config resolves to.
    fn directives(&self) -> String {
        if let Some(filter) = &self.env_filter {
            return filter.clone();
        }
        if let Ok(filter) = std::env::var("RUST_LOG") {
            return filter;
        }
        let level = self.level.as_str().to_ascii_lowercase();
        let gpu = self.gpu_level.as_str().to_ascii_lowercase();
        format!("{level},wgpu_core={gpu},wgpu_hal={gpu},naga={gpu}")
    }
}

static INIT: Once = Once::new();

/// Installs the `env_logger` backend; later calls are no-ops.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let directives = config.directives();
        let result = env_logger::Builder::new()
            .parse_filters(&directives)
            .write_style(config.write_style)
            .format_timestamp_millis()
            .try_init();

        match result {
            Ok(()) => log::debug!("logging: {directives}"),
            // A test harness may have installed its own logger.
            Err(e) => eprintln!("logger already installed: {e}"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_is_used_verbatim() {
        let config = LoggingConfig {
            env_filter: Some("ishtar_engine::splat=trace".into()),
            ..Default::default()
        };
        assert_eq!(config.directives(), "ishtar_engine::splat=trace");
    }

    #[test]
    fn verbose_keeps_gpu_stack_quiet() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let d = LoggingConfig::verbose().directives();
        assert!(d.starts_with("debug,"));
        assert!(d.contains("wgpu_hal=warn"));
    }
}
