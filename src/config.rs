/// Service configuration loader - parses service.toml
///
/// Keeps the upstream feed URL, schedule and HTTP settings out of the code
/// so they can be changed without recompiling. Every field has a default,
/// so a missing `service.toml` yields a working configuration.
///
/// The database connection string is deliberately not part of this file;
/// it comes from `DATABASE_URL` (see `db`).

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "service.toml";

/// Cologne open-data portal, gas station layer, reprojected to WGS84.
pub const DEFAULT_FEED_URL: &str = "https://geoportal.stadt-koeln.de/arcgis/rest/services/verkehr/gefahrgutstrecken/MapServer/0/query?where=objectid+is+not+null&outFields=*&returnGeometry=true&outSR=4326&f=pjson";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Runtime configuration for the daemon and the one-shot importer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Upstream ArcGIS query URL returning the feature envelope.
    pub feed_url: String,
    /// Upper bound on one fetch, so a stalled upstream cannot hold the import slot.
    pub fetch_timeout_secs: u64,
    /// The upstream portal has shipped broken certificate chains before.
    pub accept_invalid_certs: bool,
    pub import_interval_minutes: u64,
    pub http_port: u16,
    pub pool_size: u32,
    pub default_radius_meters: f64,
    /// Optional upper bound on requested radii. Unset means no limit.
    pub max_radius_meters: Option<f64>,
    pub log_json: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            fetch_timeout_secs: 30,
            accept_invalid_certs: false,
            import_interval_minutes: 60,
            http_port: 3000,
            pool_size: 8,
            default_radius_meters: 1000.0,
            max_radius_meters: None,
            log_json: false,
        }
    }
}

impl ServiceConfig {
    /// Parses a configuration from TOML text and validates it.
    pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `path`, or from `service.toml` when `path` is
    /// `None`. Only the implicit default file may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        match fs::read_to_string(&path) {
            Ok(contents) => Self::from_toml_str(&contents, &path),
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("{} not found, using built-in defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.feed_url.starts_with("http://") || self.feed_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "feed_url",
                reason: format!("expected an http(s) URL, got '{}'", self.feed_url),
            });
        }
        if self.fetch_timeout_secs == 0 {
            return Err(invalid_zero("fetch_timeout_secs"));
        }
        if self.import_interval_minutes == 0 {
            return Err(invalid_zero("import_interval_minutes"));
        }
        if self.pool_size == 0 {
            return Err(invalid_zero("pool_size"));
        }
        if !(self.default_radius_meters.is_finite() && self.default_radius_meters > 0.0) {
            return Err(ConfigError::Invalid {
                field: "default_radius_meters",
                reason: "must be a positive number".to_string(),
            });
        }
        if let Some(max) = self.max_radius_meters {
            if !(max.is_finite() && max > 0.0) {
                return Err(ConfigError::Invalid {
                    field: "max_radius_meters",
                    reason: "must be a positive number".to_string(),
                });
            }
            if self.default_radius_meters > max {
                return Err(ConfigError::Invalid {
                    field: "default_radius_meters",
                    reason: format!("must not exceed max_radius_meters ({})", max),
                });
            }
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn import_interval(&self) -> Duration {
        Duration::from_secs(self.import_interval_minutes * 60)
    }
}

fn invalid_zero(field: &'static str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: "must be greater than zero".to_string(),
    }
}
