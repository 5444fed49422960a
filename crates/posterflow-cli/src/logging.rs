//! Tracing subscriber setup.

use posterflow_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Filter directives when `RUST_LOG` is not set: `--verbose` wins over the
/// configured level, and per-crate filters are appended.
pub fn filter_directives(config: &LoggingConfig, verbose: bool) -> String {
    let level = if verbose {
        "debug".to_string()
    } else {
        config.level.clone().unwrap_or_else(|| "info".into())
    };
    std::iter::once(level)
        .chain(config.filters.iter().cloned())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn init(config: &LoggingConfig, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config, verbose)));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match (config.format.as_str(), config.output.as_str()) {
        ("json", "stdout") => builder.json().with_writer(std::io::stdout).init(),
        ("json", _) => builder.json().with_writer(std::io::stderr).init(),
        (_, "stdout") => builder.with_writer(std::io::stdout).init(),
        _ => builder.with_writer(std::io::stderr).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(filter_directives(&LoggingConfig::default(), false), "info");
        assert_eq!(filter_directives(&LoggingConfig::default(), true), "debug");
    }

    #[test]
    fn test_configured_level_and_filters() {
        let config = LoggingConfig {
            level: Some("warn".into()),
            filters: vec!["posterflow_jobs=debug".into(), "hyper=off".into()],
            ..Default::default()
        };
        assert_eq!(
            filter_directives(&config, false),
            "warn,posterflow_jobs=debug,hyper=off"
        );
        assert_eq!(
            filter_directives(&config, true),
            "debug,posterflow_jobs=debug,hyper=off"
        );
    }
}
