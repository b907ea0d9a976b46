//! Configuration loading for the CATH-SM pipeline client.
//! Reads cathsm.toml from the current directory or the path in the
//! CATHSM_CONFIG env var. Secrets (API passwords/tokens) are taken from the
//! environment, never from the TOML file.

use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_API1_BASE: &str = "https://api01.cathdb.info";
pub const DEFAULT_API2_BASE: &str = "https://beta.swissmodel.expasy.org";

pub const API1_PASSWORD_ENV: &str = "CATHSM_API1_PASSWORD";
pub const API2_PASSWORD_ENV: &str = "CATHSM_API2_PASSWORD";
pub const API1_TOKEN_ENV: &str = "CATHSM_API1_TOKEN";
pub const API2_TOKEN_ENV: &str = "CATHSM_API2_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api1: ApiConfig,
    #[serde(default)]
    pub api2: ApiConfig,
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: String,
    pub user: Option<String>,
    /// Filled from the environment by `Config::load`, never from TOML.
    #[serde(skip)]
    pub password: Option<SecretString>,
    #[serde(skip)]
    pub token: Option<SecretString>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            user: None,
            password: None,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
    #[serde(default = "default_out_dir")]
    pub out_dir: String,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_poll_retries")]
    pub max_poll_retries: u32,
}

fn default_work_dir()        -> String { "work".to_string() }
fn default_out_dir()         -> String { "out".to_string() }
fn default_max_workers()     -> usize  { 4 }
fn default_poll_interval()   -> u64    { 2 }
fn default_max_poll_retries() -> u32   { 5 }

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            out_dir: default_out_dir(),
            max_workers: default_max_workers(),
            poll_interval_secs: default_poll_interval(),
            max_poll_retries: default_max_poll_retries(),
        }
    }
}

impl Config {
    /// Load configuration from CATHSM_CONFIG or ./cathsm.toml.
    ///
    /// A missing file is not an error: the defaults plus environment secrets
    /// are enough when the CLI supplies users and base URLs.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CATHSM_CONFIG").unwrap_or_else(|_| "cathsm.toml".to_string());
        let mut config = if Path::new(&path).exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_defaults();
        config.hydrate_secrets();
        Ok(config)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        let mut config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        config.apply_defaults();
        config.hydrate_secrets();
        Ok(config)
    }

    fn apply_defaults(&mut self) {
        if self.api1.base_url.is_empty() {
            self.api1.base_url = DEFAULT_API1_BASE.to_string();
        }
        if self.api2.base_url.is_empty() {
            self.api2.base_url = DEFAULT_API2_BASE.to_string();
        }
    }

    fn hydrate_secrets(&mut self) {
        self.api1.password = env_secret(API1_PASSWORD_ENV);
        self.api2.password = env_secret(API2_PASSWORD_ENV);
        self.api1.token = env_secret(API1_TOKEN_ENV);
        self.api2.token = env_secret(API2_TOKEN_ENV);
    }
}

fn env_secret(key: &str) -> Option<SecretString> {
    std::env::var(key).ok().filter(|v| !v.is_empty()).map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_full_config() {
        let toml = r#"
            [api1]
            base_url = "https://api1.example.org"
            user = "alice"

            [api2]
            user = "bob"

            [run]
            work_dir = "scratch"
            max_workers = 2
        "#;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(toml.as_bytes()).unwrap();

        let config = Config::load_from(f.path().to_str().unwrap()).unwrap();
        assert_eq!(config.api1.base_url, "https://api1.example.org");
        assert_eq!(config.api1.user.as_deref(), Some("alice"));
        assert_eq!(config.api2.base_url, DEFAULT_API2_BASE);
        assert_eq!(config.run.work_dir, "scratch");
        assert_eq!(config.run.max_workers, 2);
        assert_eq!(config.run.poll_interval_secs, 2);
    }

    #[test]
    fn defaults_when_sections_missing() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"").unwrap();

        let config = Config::load_from(f.path().to_str().unwrap()).unwrap();
        assert_eq!(config.api1.base_url, DEFAULT_API1_BASE);
        assert_eq!(config.run.max_workers, 4);
        assert_eq!(config.run.max_poll_retries, 5);
    }
}
