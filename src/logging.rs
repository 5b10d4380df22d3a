use crate::error::ConfigurationError;
use fern::colors::{Color, ColoredLevelConfig};
use log::{LevelFilter, debug};

pub fn parse_level(level: &str) -> Result<LevelFilter, ConfigurationError> {
    match level {
        "off" => Ok(LevelFilter::Off),
        "trace" => Ok(LevelFilter::Trace),
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" => Ok(LevelFilter::Warn),
        "error" => Ok(LevelFilter::Error),
        _ => Err(ConfigurationError::Invalid(format!(
            "Unknown log level encountered: '{}'",
            level
        ))),
    }
}

pub fn setup_logging(level: &str) -> Result<(), ConfigurationError> {
    let level = parse_level(level)?;

    let colors = ColoredLevelConfig::new()
        .trace(Color::Cyan)
        .debug(Color::Magenta)
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{:width$}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message,
                width = 5
            ))
        })
        .level(level)
        // Keep dependency chatter out of tracker traces.
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("hyper", LevelFilter::Warn)
        .chain(std::io::stderr())
        .apply()
        .map_err(|e| ConfigurationError::Invalid(format!("Failed to initialize logging: {}", e)))?;

    debug!("logging initialized.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::Debug);
        assert_eq!(parse_level("off").unwrap(), LevelFilter::Off);
        assert!(matches!(parse_level("verbose"), Err(ConfigurationError::Invalid(_))));
    }
}
