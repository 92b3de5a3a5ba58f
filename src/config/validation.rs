use super::{AppConfig, ConfigError};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_markers(config)?;
    validate_output(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_markers(config: &AppConfig) -> Result<(), ConfigError> {
    let markers = &config.markers;
    if markers.start.is_empty() {
        return Err(validation_err("markers.start cannot be empty"));
    }
    if markers.end.is_empty() {
        return Err(validation_err("markers.end cannot be empty"));
    }
    if markers.start == markers.end {
        return Err(validation_err("markers.start and markers.end must differ"));
    }
    // A marker inside the other would be found in place of the one expected.
    if markers.start.contains(markers.end.as_str()) || markers.end.contains(markers.start.as_str())
    {
        return Err(validation_err(format!(
            "markers must not contain each other (start={:?}, end={:?})",
            markers.start, markers.end
        )));
    }
    Ok(())
}

fn validate_output(config: &AppConfig) -> Result<(), ConfigError> {
    let output = &config.output;
    if output.message_id_prefix.trim().is_empty() {
        return Err(validation_err("output.message_id_prefix cannot be empty"));
    }
    if output.default_model.trim().is_empty() {
        return Err(validation_err("output.default_model cannot be empty"));
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::*;

    fn make_valid_config() -> AppConfig {
        AppConfig::default()
    }

    fn validation_message(config: &AppConfig) -> String {
        match validate_config(config) {
            Err(ConfigError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = make_valid_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_markers() {
        let mut config = make_valid_config();
        config.markers.start = String::new();
        assert!(validation_message(&config).contains("markers.start"));

        let mut config = make_valid_config();
        config.markers.end = String::new();
        assert!(validation_message(&config).contains("markers.end"));
    }

    #[test]
    fn test_identical_markers() {
        let mut config = make_valid_config();
        config.markers.end = config.markers.start.clone();
        assert!(validation_message(&config).contains("must differ"));
    }

    #[test]
    fn test_nested_markers() {
        let mut config = make_valid_config();
        config.markers.start = "<t>".to_string();
        config.markers.end = "<t>>".to_string();
        assert!(validation_message(&config).contains("contain each other"));
    }

    #[test]
    fn test_custom_markers_accepted() {
        let mut config = make_valid_config();
        config.markers = MarkersConfig {
            start: "<reasoning>".to_string(),
            end: "</reasoning>".to_string(),
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_prefix() {
        let mut config = make_valid_config();
        config.output.message_id_prefix = " ".to_string();
        assert!(validation_message(&config).contains("message_id_prefix"));
    }

    #[test]
    fn test_empty_default_model() {
        let mut config = make_valid_config();
        config.output.default_model = String::new();
        assert!(validation_message(&config).contains("default_model"));
    }

    #[test]
    fn test_log_levels() {
        let mut config = make_valid_config();
        config.features.log_level = "warning".to_string();
        assert!(validate_config(&config).is_ok());
        config.features.log_level = "VERBOSE".to_string();
        assert!(validation_message(&config).contains("log_level"));
    }
}
