//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, `.env` and environment variables.

use serde_json::Value;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::{ConfigError, CovenantConfig, LogFormat};

/// Default prefix for environment overrides.
pub const DEFAULT_ENV_PREFIX: &str = "COVENANT";

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones:
/// 1. Default values (or a preset)
/// 2. Configuration files and strings, merged key by key in order
/// 3. Environment variables (optionally seeded from a `.env` file)
///
/// # Example
///
/// ```no_run
/// use covenant_config::ConfigLoader;
///
/// # fn main() -> Result<(), covenant_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_file("covenant.toml")?
///     .with_dotenv()?
///     .with_env_prefix("COVENANT")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    layers: Value,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&CovenantConfig::default())
    }

    fn from_config(config: &CovenantConfig) -> Self {
        Self {
            layers: serde_json::to_value(config).unwrap_or(Value::Null),
            env_prefix: None,
        }
    }

    /// Start with default configuration values.
    ///
    /// This is called automatically by `new()`, but can be chained for clarity.
    /// Layers added before this call are discarded.
    #[must_use]
    pub fn with_defaults(self) -> Self {
        Self {
            env_prefix: self.env_prefix,
            ..Self::new()
        }
    }

    /// Start with development preset configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use covenant_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_development()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(self) -> Self {
        Self {
            env_prefix: self.env_prefix,
            ..Self::from_config(&CovenantConfig::development())
        }
    }

    /// Start with production preset configuration.
    #[must_use]
    pub fn with_production(self) -> Self {
        Self {
            env_prefix: self.env_prefix,
            ..Self::from_config(&CovenantConfig::production())
        }
    }

    /// Load configuration from a file.
    ///
    /// Supports TOML (`.toml`) and JSON (`.json`) formats, chosen by
    /// extension. Keys present in the file override earlier layers; keys
    /// it leaves out keep their current values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist or cannot be read
    /// - The file contains invalid TOML/JSON
    /// - The file contains unknown fields
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let origin = path.display().to_string();
        let layer = parse_layer(&content, &extension, &origin)?;
        self.merge_layer(layer, &origin)?;

        Ok(self)
    }

    /// Load configuration from an optional file.
    ///
    /// If the file exists, loads it. If not, silently continues.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string.
    ///
    /// `format` is `"toml"` or `"json"`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails or the format is unknown.
    ///
    /// # Example
    ///
    /// ```
    /// use covenant_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [server]
    ///     http_addr = "127.0.0.1:3000"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    /// assert_eq!(config.server.request_timeout_ms, 30_000);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer = parse_layer(content, &format.to_lowercase(), "string")?;
        self.merge_layer(layer, "string")?;
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`, e.g.
    /// `COVENANT__SERVER__HTTP_ADDR=0.0.0.0:9000`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file from the current directory (or a parent) into the
    /// process environment. A missing file is not an error.
    ///
    /// Variables already set in the environment are not overwritten.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a `.env` file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::parse_error(".env", e)),
        }
    }

    /// Load a specific dotenv file into the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing or cannot be parsed.
    pub fn with_dotenv_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        dotenvy::from_path(path)
            .map_err(|e| ConfigError::parse_error(path.display().to_string(), e))?;
        Ok(self)
    }

    /// Finalize and return the loaded configuration.
    ///
    /// Applies environment variable overrides (if a prefix was set) and
    /// validates the final configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Environment variable parsing fails
    /// - Configuration validation fails
    pub fn load(self) -> Result<CovenantConfig, ConfigError> {
        let vars: Vec<(String, String)> = match &self.env_prefix {
            Some(prefix) => env::vars().filter(|(k, _)| k.starts_with(prefix)).collect(),
            None => Vec::new(),
        };
        self.load_with_vars(vars)
    }

    /// Finalize without environment overrides or validation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the merged layers do not form a valid
    /// configuration document.
    pub fn load_unvalidated(self) -> Result<CovenantConfig, ConfigError> {
        serde_json::from_value(self.layers)
            .map_err(|e| ConfigError::parse_error("merged configuration", e))
    }

    fn load_with_vars(
        mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<CovenantConfig, ConfigError> {
        let prefix = self.env_prefix.take();
        let mut config = self.load_unvalidated()?;

        if let Some(prefix) = prefix {
            let mut vars: Vec<(String, String)> = vars.into_iter().collect();
            vars.sort();
            for (key, value) in vars {
                apply_env_var(&mut config, &key, &value, &prefix)?;
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn merge_layer(&mut self, layer: Value, origin: &str) -> Result<(), ConfigError> {
        // Unknown fields are reported against the source that introduced them.
        serde_json::from_value::<CovenantConfig>(layer.clone())
            .map_err(|e| ConfigError::parse_error(origin, e))?;
        merge_values(&mut self.layers, layer);
        Ok(())
    }
}

fn parse_layer(content: &str, format: &str, origin: &str) -> Result<Value, ConfigError> {
    match format {
        "toml" => {
            let table: toml::Value =
                toml::from_str(content).map_err(|e| ConfigError::parse_error(origin, e))?;
            serde_json::to_value(table).map_err(|e| ConfigError::parse_error(origin, e))
        }
        "json" => serde_json::from_str(content).map_err(|e| ConfigError::parse_error(origin, e)),
        other => Err(ConfigError::validation_error(format!(
            "unsupported configuration format '{other}' for {origin}"
        ))),
    }
}

/// Deep-merges `overlay` into `base`. Objects merge key by key; anything
/// else replaces.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Applies one `PREFIX__SECTION__KEY` variable.
fn apply_env_var(
    config: &mut CovenantConfig,
    key: &str,
    value: &str,
    prefix: &str,
) -> Result<(), ConfigError> {
    let Some(path) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
        // Shares the prefix but is not an override (e.g. COVENANT_HOME).
        return Ok(());
    };

    let parts: Vec<&str> = path.split("__").collect();

    match parts.as_slice() {
        // Server section
        ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
        ["SERVER", "REQUEST_TIMEOUT_MS"] => {
            config.server.request_timeout_ms = parse_number(key, value)?;
        }
        ["SERVER", "MAX_BODY_BYTES"] => config.server.max_body_bytes = parse_number(key, value)?,
        ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
            config.server.shutdown_timeout_secs = parse_number(key, value)?;
        }

        // Validation section
        ["VALIDATION", "VALIDATE_RESPONSES"] => {
            config.validation.validate_responses = parse_flag(key, value)?;
        }
        ["VALIDATION", "EXPOSE_RESPONSE_ISSUES"] => {
            config.validation.expose_response_issues = parse_flag(key, value)?;
        }
        ["VALIDATION", "REJECT_UNDECLARED_STATUS"] => {
            config.validation.reject_undeclared_status = parse_flag(key, value)?;
        }

        // Logging section
        ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
        ["LOGGING", "FORMAT"] => {
            config.logging.format =
                LogFormat::from_str(value).map_err(|e| ConfigError::env_parse_error(key, e))?;
        }
        ["LOGGING", "ANSI"] => config.logging.ansi = parse_flag(key, value)?,

        // Metrics section
        ["METRICS", "ENABLED"] => config.metrics.enabled = parse_flag(key, value)?,
        ["METRICS", "ADDR"] => config.metrics.addr = value.to_string(),

        // Docs section
        ["DOCS", "ENABLED"] => config.docs.enabled = parse_flag(key, value)?,
        ["DOCS", "PATH"] => config.docs.path = value.to_string(),
        ["DOCS", "TITLE"] => config.docs.title = value.to_string(),
        ["DOCS", "VERSION"] => config.docs.version = value.to_string(),
        ["DOCS", "DESCRIPTION"] => {
            config.docs.description = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            };
        }

        _ => return Err(ConfigError::env_parse_error(key, "unknown configuration key")),
    }

    Ok(())
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, CovenantConfig::default());
    }

    #[test]
    fn test_loader_with_production() {
        let config = ConfigLoader::new().with_production().load().unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_layers_merge_key_by_key() {
        let config = ConfigLoader::new()
            .with_development()
            .with_string(
                r#"
                    [server]
                    max_body_bytes = 2048
                "#,
                "toml",
            )
            .unwrap()
            .with_string(r#"{"docs": {"title": "Users"}}"#, "json")
            .unwrap()
            .load()
            .unwrap();

        // From the preset
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.server.http_addr, "127.0.0.1:8080");
        // From the layers
        assert_eq!(config.server.max_body_bytes, 2048);
        assert_eq!(config.docs.title, "Users");
        assert_eq!(config.docs.path, "/openapi.json");
    }

    #[test]
    fn test_unknown_field_names_its_source() {
        let err = ConfigLoader::new()
            .with_string("[server]\nport = 8080", "toml")
            .unwrap_err();

        match err {
            ConfigError::ParseError { origin, message } => {
                assert_eq!(origin, "string");
                assert!(message.contains("port"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unsupported_format() {
        let result = ConfigLoader::new().with_string("a: 1", "yaml");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_loader_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [validation]
            expose_response_issues = true

            [logging]
            format = "compact"
            "#
        )
        .unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert!(config.validation.expose_response_issues);
        assert!(config.validation.validate_responses);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_loader_with_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"metrics": {{"enabled": false}}}}"#).unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/covenant.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/covenant.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.server.http_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_env_overrides_apply_last() {
        let config = ConfigLoader::new()
            .with_string("[server]\nhttp_addr = \"127.0.0.1:3000\"", "toml")
            .unwrap()
            .with_env_prefix("TEST")
            .load_with_vars(vars(&[
                ("TEST__SERVER__HTTP_ADDR", "127.0.0.1:4000"),
                ("TEST__VALIDATION__REJECT_UNDECLARED_STATUS", "yes"),
                ("TEST__LOGGING__FORMAT", "pretty"),
                ("TEST__DOCS__DESCRIPTION", "User service"),
                ("TEST_UNRELATED", "ignored"),
            ]))
            .unwrap();

        assert_eq!(config.server.http_addr, "127.0.0.1:4000");
        assert!(config.validation.reject_undeclared_status);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.docs.description.as_deref(), Some("User service"));
    }

    #[test]
    fn test_env_overrides_are_validated() {
        let result = ConfigLoader::new()
            .with_env_prefix("TEST")
            .load_with_vars(vars(&[("TEST__DOCS__PATH", "docs")]));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_apply_env_var_invalid_values() {
        let mut config = CovenantConfig::default();
        let err = apply_env_var(&mut config, "TEST__SERVER__MAX_BODY_BYTES", "lots", "TEST")
            .unwrap_err();
        assert!(err.to_string().contains("expected integer"));

        let err = apply_env_var(&mut config, "TEST__METRICS__ENABLED", "maybe", "TEST")
            .unwrap_err();
        assert!(err.to_string().contains("expected boolean"));

        let err = apply_env_var(&mut config, "TEST__SERVER__PORT", "80", "TEST").unwrap_err();
        assert!(err.to_string().contains("unknown configuration key"));
    }

    #[test]
    fn test_merge_values() {
        let mut base = serde_json::json!({ "a": { "b": 1, "c": 2 }, "d": [1] });
        merge_values(
            &mut base,
            serde_json::json!({ "a": { "c": 3 }, "d": [2, 3], "e": true }),
        );
        assert_eq!(
            base,
            serde_json::json!({ "a": { "b": 1, "c": 3 }, "d": [2, 3], "e": true })
        );
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));

        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));

        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }
}
