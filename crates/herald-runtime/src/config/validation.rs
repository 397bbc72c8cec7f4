//! Configuration validation.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, HeraldConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &HeraldConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.name.trim().is_empty() {
        return Err(ConfigError::missing_field("bot.name"));
    }

    if bot.default_prefix.is_empty() {
        return Err(ConfigError::missing_field("bot.default_prefix"));
    }

    // Message content is lowercased before prefix matching.
    if bot.default_prefix != bot.default_prefix.to_lowercase() {
        return Err(ConfigError::validation(format!(
            "Default prefix must be lowercase, got {:?}",
            bot.default_prefix
        )));
    }

    if bot.default_prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::validation(
            "Default prefix cannot contain whitespace",
        ));
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    for target in logging.filters.keys() {
        if target.is_empty() || target.contains(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "Invalid log filter target: {target:?}"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&HeraldConfig::default()).is_ok());
    }

    #[test]
    fn test_bot_rules() {
        let mut config = HeraldConfig::default();
        config.bot.name = "  ".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { ref field }) if field == "bot.name"
        ));

        let mut config = HeraldConfig::default();
        config.bot.default_prefix = String::new();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        config.bot.default_prefix = "H!".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));

        config.bot.default_prefix = "h !".into();
        assert!(validate_config(&config).is_err());

        config.bot.default_prefix = "h!".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_logging_rules() {
        let mut config = HeraldConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some(PathBuf::from("logs/herald.log"));
        assert!(validate_config(&config).is_ok());

        config.logging.filters.insert("bad target".into(), LogLevel::Debug);
        assert!(validate_config(&config).is_err());
    }
}
