//! Session settings.
//!
//! Settings come from an optional file (TOML, JSON or YAML, picked by
//! extension) layered under `ANGIE_CONSOLE_*` environment variables:
//!
//! ```toml
//! refresh = "1s"
//! history_limit = 60
//! skip_unwatched = false
//!
//! [history_limits]
//! server_zones = 120
//! caches = 30
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::data::duration::parse_duration;
use crate::data::{Family, DEFAULT_HISTORY_SIZE};
use crate::error::{ConsoleError, Result};

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "ANGIE_CONSOLE";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Poll interval, e.g. "1s" or "500ms".
    pub refresh: String,
    /// History points kept per entity.
    pub history_limit: usize,
    /// Per-family overrides keyed by family name (e.g. `server_zones`).
    pub history_limits: BTreeMap<String, usize>,
    /// Stop computing families no subscriber watches.
    pub skip_unwatched: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh: "1s".to_string(),
            history_limit: DEFAULT_HISTORY_SIZE,
            history_limits: BTreeMap::new(),
            skip_unwatched: false,
        }
    }
}

impl Settings {
    /// Load settings from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// The parsed poll interval. Must be non-zero.
    pub fn refresh_interval(&self) -> Result<Duration> {
        let interval = parse_duration(&self.refresh)?;
        if interval.is_zero() {
            return Err(ConsoleError::Duration(self.refresh.clone()));
        }
        Ok(interval)
    }

    /// Per-family history limits, skipping unknown family names.
    pub fn family_history_limits(&self) -> BTreeMap<Family, usize> {
        self.history_limits
            .iter()
            .filter_map(|(name, limit)| match name.parse::<Family>() {
                Ok(family) => Some((family, *limit)),
                Err(_) => {
                    tracing::warn!(family = %name, "ignoring history limit for unknown family");
                    None
                }
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        self.refresh_interval()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn defaults_without_file() {
        let settings = Settings::default();
        assert_eq!(settings.refresh_interval().unwrap(), Duration::from_secs(1));
        assert_eq!(settings.history_limit, 60);
        assert!(!settings.skip_unwatched);
    }

    #[test]
    fn loads_toml_file() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
refresh = "250ms"
history_limit = 10
skip_unwatched = true

[history_limits]
caches = 5
bogus = 9
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.refresh_interval().unwrap(), Duration::from_millis(250));
        assert_eq!(settings.history_limit, 10);
        assert!(settings.skip_unwatched);
        assert_eq!(
            settings.family_history_limits(),
            BTreeMap::from([(Family::Caches, 5)])
        );
    }

    #[test]
    fn environment_overrides_file() {
        // A prefix of its own so parallel tests never see the variable
        const PREFIX: &str = "ANGIE_CONSOLE_ENV_OVERRIDE_TEST";
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "history_limit = 10").unwrap();

        std::env::set_var("ANGIE_CONSOLE_ENV_OVERRIDE_TEST_HISTORY_LIMIT", "7");
        let overridden = Settings::load_with_prefix(Some(file.path()), PREFIX);
        std::env::remove_var("ANGIE_CONSOLE_ENV_OVERRIDE_TEST_HISTORY_LIMIT");

        assert_eq!(overridden.unwrap().history_limit, 7);
    }

    #[test]
    fn rejects_bad_refresh() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, r#"refresh = "whenever""#).unwrap();

        assert!(Settings::load(Some(file.path())).is_err());

        let zero = Settings {
            refresh: "0ms".to_string(),
            ..Settings::default()
        };
        assert!(zero.refresh_interval().is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/console.toml"))).is_err());
    }
}
