//! Data source configuration.
//!
//! Each named environment resolves to one [`DataSourceConfig`]: which driver
//! to use, where to connect and how to size the pool. Configurations are
//! usually read from Java-properties style text:
//!
//! ```text
//! # default-config.properties
//! driver=memory
//! url=mem://app
//! username=app
//! password=secret
//! initialSize=5
//! minIdle=2
//! maxActive=20
//! maxWait=3000
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use minibatis_pool::PoolConfig;

use crate::driver::ConnectOptions;
use crate::error::{Error, Result};

/// Environment opened when no name is given.
pub const DEFAULT_ENVIRONMENT: &str = "default-config";

/// Everything needed to build one environment's pool.
#[derive(Clone, PartialEq, Eq)]
pub struct DataSourceConfig {
    /// Name of the registered driver.
    pub driver: String,
    /// Driver-specific connect target.
    pub url: String,
    /// Login name.
    pub user: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// Pool sizing and timeouts.
    pub pool: PoolConfig,
}

impl DataSourceConfig {
    /// Create a configuration with default pool settings.
    pub fn new(driver: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            url: url.into(),
            user: None,
            password: None,
            pool: PoolConfig::default(),
        }
    }

    /// Set the login credentials.
    #[must_use]
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Set the pool configuration.
    #[must_use]
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Parse Java-properties style text.
    ///
    /// Keys are matched case-insensitively; `#` and `!` start comment
    /// lines; `=` or `:` separates key and value. `driver` and `url` are
    /// required. Unknown keys are ignored.
    pub fn from_properties(text: &str) -> Result<Self> {
        let mut driver = None;
        let mut url = None;
        let mut user = None;
        let mut password = None;
        let mut pool = PoolConfig::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let (key, value) = line
                .split_once(['=', ':'])
                .ok_or_else(|| Error::Config(format!("invalid property line: {line}")))?;

            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "driver" | "driverclassname" => driver = Some(value.to_string()),
                "url" | "jdbcurl" => url = Some(value.to_string()),
                "username" | "user" => user = Some(value.to_string()),
                "password" => password = Some(value.to_string()),
                "initialsize" => pool.initial_size = parse_count(&key, value)?,
                "minidle" => pool.min_idle = parse_count(&key, value)?,
                "maxactive" => pool.max_active = parse_count(&key, value)?,
                "maxwait" => {
                    let millis: u64 = value
                        .parse()
                        .map_err(|_| Error::Config(format!("invalid maxWait: {value}")))?;
                    pool.max_wait = Duration::from_millis(millis);
                }
                "waitoncapacity" => {
                    pool.wait_on_capacity = value.eq_ignore_ascii_case("true")
                        || value.eq_ignore_ascii_case("yes")
                        || value == "1";
                }
                _ => {
                    tracing::debug!(key = key, "ignoring unknown data source property");
                }
            }
        }

        let driver = driver.ok_or_else(|| Error::Config("missing property: driver".into()))?;
        let url = url.ok_or_else(|| Error::Config("missing property: url".into()))?;

        pool.validate()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            driver,
            url,
            user,
            password,
            pool,
        })
    }

    /// Connect options for the driver.
    #[must_use]
    pub fn connect_options(&self) -> ConnectOptions {
        let mut options = ConnectOptions::new(self.url.clone());
        options.user.clone_from(&self.user);
        options.password.clone_from(&self.password);
        options
    }
}

fn parse_count(key: &str, value: &str) -> Result<u32> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("invalid {key}: {value}")))
}

impl fmt::Debug for DataSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceConfig")
            .field("driver", &self.driver)
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("pool", &self.pool)
            .finish()
    }
}

/// Resolves environment names to data source configurations.
pub trait ConfigSource: Send + Sync {
    /// Load the configuration of environment `name`.
    fn load(&self, name: &str) -> Result<DataSourceConfig>;
}

/// Reads `<dir>/<name>.properties`.
#[derive(Debug, Clone)]
pub struct PropertiesDir {
    dir: PathBuf,
}

impl PropertiesDir {
    /// Read configurations from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of environment `name`'s file.
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.properties"))
    }

    /// The directory searched.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ConfigSource for PropertiesDir {
    fn load(&self, name: &str) -> Result<DataSourceConfig> {
        let path = self.path_for(name);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        DataSourceConfig::from_properties(&text)
    }
}

/// In-memory name → configuration table.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    configs: HashMap<String, DataSourceConfig>,
}

impl StaticConfig {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `config` under `name`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, config: DataSourceConfig) -> Self {
        self.configs.insert(name.into(), config);
        self
    }
}

impl ConfigSource for StaticConfig {
    fn load(&self, name: &str) -> Result<DataSourceConfig> {
        self.configs
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Config(format!("unknown environment: {name}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PROPERTIES: &str = "\
# primary database
driver=memory
url = mem://app
Username=app
password=s3cret
initialSize=3
MINIDLE=1
maxActive=8
maxWait=250
! legacy key kept for old files
testOnBorrow=true
";

    #[test]
    fn test_from_properties() {
        let config = DataSourceConfig::from_properties(PROPERTIES).unwrap();

        assert_eq!(config.driver, "memory");
        assert_eq!(config.url, "mem://app");
        assert_eq!(config.user.as_deref(), Some("app"));
        assert_eq!(config.pool.initial_size, 3);
        assert_eq!(config.pool.min_idle, 1);
        assert_eq!(config.pool.max_active, 8);
        assert_eq!(config.pool.max_wait, Duration::from_millis(250));
        assert!(!config.pool.wait_on_capacity);
    }

    #[test]
    fn test_colon_separator_and_wait_on_capacity() {
        let config =
            DataSourceConfig::from_properties("driver: memory\nurl: mem://x\nwaitOnCapacity: yes\n")
                .unwrap();
        assert!(config.pool.wait_on_capacity);
        assert_eq!(config.user, None);
    }

    #[test]
    fn test_missing_required_keys() {
        let err = DataSourceConfig::from_properties("url=mem://x").unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("driver")));
    }

    #[test]
    fn test_invalid_numbers() {
        let err = DataSourceConfig::from_properties("driver=m\nurl=u\nmaxActive=lots").unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("maxactive")));

        let err = DataSourceConfig::from_properties("driver=m\nurl=u\nmaxWait=-1").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_pool_validation_applies() {
        let err =
            DataSourceConfig::from_properties("driver=m\nurl=u\nmaxActive=2\nminIdle=3").unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("min_idle")));
    }

    #[test]
    fn test_line_without_separator() {
        assert!(DataSourceConfig::from_properties("driver=m\nurl=u\njunk").is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = DataSourceConfig::from_properties(PROPERTIES).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_connect_options() {
        let config = DataSourceConfig::new("memory", "mem://app").credentials("app", "pw");
        let options = config.connect_options();
        assert_eq!(options.url, "mem://app");
        assert_eq!(options.user.as_deref(), Some("app"));
    }

    #[test]
    fn test_static_config() {
        let source = StaticConfig::new().with(DEFAULT_ENVIRONMENT, DataSourceConfig::new("m", "u"));
        assert_eq!(source.load(DEFAULT_ENVIRONMENT).unwrap().driver, "m");
        assert!(matches!(source.load("other"), Err(Error::Config(_))));
    }

    #[test]
    fn test_properties_dir() {
        let dir = std::env::temp_dir().join(format!("minibatis-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("reporting.properties"), PROPERTIES).unwrap();

        let source = PropertiesDir::new(&dir);
        assert_eq!(source.load("reporting").unwrap().pool.max_active, 8);
        assert!(matches!(source.load("missing"), Err(Error::Config(_))));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
