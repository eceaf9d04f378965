use crate::config::Config;
use log::LevelFilter;
use simplelog::{self, ConfigBuilder};

/// Dependency modules silenced below `TRACE`.
const FILTERED_MODULES: &[&str] = &["sqlx", "sea_orm", "hyper", "reqwest", "rustls", "h2"];

pub struct Logger {}

impl Logger {
    /// Installs the global terminal logger for a job binary.
    ///
    /// Log lines go to stderr: stdout is reserved for the JSON job summary so a
    /// scheduler can capture it verbatim.
    pub fn init_logger(config: &Config) {
        let log_config = Self::build_log_config(config.log_level_filter);

        simplelog::TermLogger::init(
            config.log_level_filter,
            log_config,
            simplelog::TerminalMode::Stderr,
            simplelog::ColorChoice::Auto,
        )
        .expect("Failed to start simplelog");
    }

    fn filters_dependencies(level: LevelFilter) -> bool {
        level != LevelFilter::Trace
    }

    fn build_log_config(level: LevelFilter) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();
        builder.set_target_level(LevelFilter::Error);

        if Self::filters_dependencies(level) {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}
