// Environment-backed configuration provider.
// Decision: Snapshot the environment once at startup, never mutate the process env
// Decision: Values already present in the process environment win over the env file

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment name used when `NODE_ENV` is unset or empty
pub const DEFAULT_ENVIRONMENT: &str = "local";

/// Key that classifies the running environment
const ENVIRONMENT_KEY: &str = "NODE_ENV";

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required configuration value {0} is not set")]
    Missing(String),

    #[error("configuration value {key} is invalid: {reason}")]
    Invalid { key: String, reason: String },

    #[error("failed to load environment file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: dotenvy::Error,
    },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Read-only view over the process environment.
///
/// Every value has literal `\n` sequences decoded into real line breaks, so
/// multi-line secrets such as PEM keys can be injected as single-line
/// environment entries.
#[derive(Debug, Clone, Default)]
pub struct ConfigService {
    vars: HashMap<String, String>,
    /// Env file that seeded `vars`, if one was found
    env_file: Option<PathBuf>,
}

impl ConfigService {
    /// Load configuration from the process environment, seeded from
    /// `./.<environment>.env` when that file exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars = std::env::vars_os().filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        });
        Self::load(Path::new("."), vars)
    }

    /// Load configuration from `vars`, seeded from `<dir>/.<environment>.env`.
    ///
    /// A missing env file is not an error. A file that exists but cannot be
    /// parsed is.
    pub fn load<I>(dir: &Path, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut vars: HashMap<String, String> = vars.into_iter().collect();
        let environment = environment_name(&vars).to_string();
        let path = dir.join(format!(".{}.env", environment));
        let file_error = |source| ConfigError::File {
            path: path.display().to_string(),
            source,
        };

        let env_file = match dotenvy::from_path_iter(&path) {
            Ok(entries) => {
                for entry in entries {
                    let (key, value) = entry.map_err(file_error)?;
                    vars.entry(key).or_insert(value);
                }
                Some(path.clone())
            }
            Err(e) if e.not_found() => None,
            Err(e) => return Err(file_error(e)),
        };

        // Loaded before logging is set up; callers report `env_file()` once it is
        Ok(Self {
            env_file,
            ..Self::from_vars(vars)
        })
    }

    /// Build configuration from an explicit set of variables without
    /// consulting any env file.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(key, value)| {
                let value: String = value.into();
                (key.into(), decode_newlines(&value))
            })
            .collect();
        Self {
            vars,
            env_file: None,
        }
    }

    /// Env file that seeded this configuration, if one was found
    pub fn env_file(&self) -> Option<&Path> {
        self.env_file.as_deref()
    }

    /// Raw value for `key`, if set
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Value for `key`; absent or empty values are an error
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        match self.get(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ConfigError::Missing(key.to_string())),
        }
    }

    /// Numeric value for `key`.
    ///
    /// Absent keys and non-numeric values are errors; there is no silent default.
    pub fn get_number(&self, key: &str) -> Result<f64, ConfigError> {
        let raw = self
            .get(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))?;
        let number: f64 = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(key, format!("{:?} is not a number", raw)))?;
        if !number.is_finite() {
            return Err(ConfigError::invalid(key, format!("{:?} is not finite", raw)));
        }
        Ok(number)
    }

    /// Boolean flag for `key` (`true/false`, `1/0`, `yes/no`, case-insensitive)
    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        let raw = self
            .get(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))?;
        match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::invalid(
                key,
                format!("{:?} is not a boolean", raw),
            )),
        }
    }

    /// Parsed value for `key`, or `default` when unset.
    /// A value that is set but does not parse is an error.
    pub fn get_parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key).map(str::trim).filter(|v| !v.is_empty()) {
            Some(raw) => raw
                .parse()
                .map_err(|e: T::Err| ConfigError::invalid(key, e.to_string())),
            None => Ok(default),
        }
    }

    /// Environment name (`NODE_ENV`, default `local`)
    pub fn node_env(&self) -> &str {
        environment_name(&self.vars)
    }

    pub fn is_local(&self) -> bool {
        self.node_env() == "local"
    }

    pub fn is_development(&self) -> bool {
        self.node_env() == "development"
    }

    pub fn is_staging(&self) -> bool {
        self.node_env() == "staging"
    }

    pub fn is_production(&self) -> bool {
        self.node_env() == "production"
    }

    /// Lower-cased `FALLBACK_LANGUAGE`, if set
    pub fn fallback_language(&self) -> Option<String> {
        self.get("FALLBACK_LANGUAGE").map(str::to_lowercase)
    }
}

fn environment_name(vars: &HashMap<String, String>) -> &str {
    vars.get(ENVIRONMENT_KEY)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_ENVIRONMENT)
}

/// Rewrite literal `\n` (backslash, n) into a line break
fn decode_newlines(value: &str) -> String {
    value.replace("\\n", "\n")
}
