use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::codec::{Codec, LedgerFormat, DEFAULT_SCALE_PRECISION};
use crate::ledger::{FailurePolicy, LedgerOptions};

pub const SETTINGS_ENV: &str = "ANCHORLAND_SETTINGS";

const MAX_SCALE_PRECISION: usize = 9;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("ledger path is empty")]
    EmptyLedgerPath,

    #[error("ledger path {0:?} is a directory")]
    LedgerPathIsDirectory(PathBuf),

    #[error("scale precision {0} is out of range (0..=9)")]
    ScalePrecision(usize),

    #[error("worker thread count must be at least 1")]
    WorkerThreads,

    #[error("settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ledger_path: PathBuf,
    /// Prefab list document; the built-in list is used when unset.
    pub prefabs_path: Option<PathBuf>,
    pub format: LedgerFormat,
    pub scale_precision: usize,
    pub failure_policy: FailurePolicy,
    pub worker_threads: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from("anchors.json"),
            prefabs_path: None,
            format: LedgerFormat::Json,
            scale_precision: DEFAULT_SCALE_PRECISION,
            failure_policy: FailurePolicy::StopAtFirst,
            worker_threads: 2,
        }
    }
}

impl Settings {
    /// Loads the user settings file, falling back to defaults when it does
    /// not exist.
    pub fn load_global() -> Result<Self, SettingsError> {
        Self::load_from(&user_settings_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(?path, "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_owned(),
                    source,
                })
            }
        };

        let settings = serde_json::from_slice(&data).map_err(|source| SettingsError::Json {
            path: path.to_owned(),
            source,
        })?;

        info!(?path, "settings loaded");

        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let io_error = |source: std::io::Error| SettingsError::Io {
            path: path.to_owned(),
            source,
        };

        let data = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Json {
            path: path.to_owned(),
            source,
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        std::fs::write(path, data).map_err(io_error)
    }

    /// Configuration checks that must pass before any ledger I/O happens.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.ledger_path.as_os_str().is_empty() {
            return Err(SettingsError::EmptyLedgerPath);
        }

        if self.ledger_path.file_name().is_none() || self.ledger_path.is_dir() {
            return Err(SettingsError::LedgerPathIsDirectory(self.ledger_path.clone()));
        }

        if self.scale_precision > MAX_SCALE_PRECISION {
            return Err(SettingsError::ScalePrecision(self.scale_precision));
        }

        if self.worker_threads == 0 {
            return Err(SettingsError::WorkerThreads);
        }

        Ok(())
    }

    pub fn codec(&self) -> Codec {
        Codec::new(self.format, self.scale_precision)
    }

    pub fn ledger_options(&self) -> LedgerOptions {
        LedgerOptions {
            codec: self.codec(),
            policy: self.failure_policy,
        }
    }
}

fn user_settings_path() -> PathBuf {
    std::env::var_os(SETTINGS_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("anchorland.json"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let settings = Settings::load_from(&dir.path().join("absent.json")).unwrap();

        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"format": "lines", "failure_policy": "skip_and_continue"}"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();

        assert_eq!(settings.format, LedgerFormat::Lines);
        assert_eq!(settings.failure_policy, FailurePolicy::SkipAndContinue);
        assert_eq!(settings.scale_precision, DEFAULT_SCALE_PRECISION);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf/settings.json");

        let settings = Settings {
            ledger_path: PathBuf::from("ledger.txt"),
            format: LedgerFormat::Lines,
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Settings::load_from(&path),
            Err(SettingsError::Json { .. })
        ));
    }

    #[test]
    fn validation_catches_configuration_errors() {
        let dir = tempfile::tempdir().unwrap();

        let settings = Settings {
            ledger_path: PathBuf::new(),
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(SettingsError::EmptyLedgerPath)));

        let settings = Settings {
            ledger_path: dir.path().to_owned(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::LedgerPathIsDirectory(_))
        ));

        let settings = Settings {
            scale_precision: 12,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(SettingsError::ScalePrecision(12))));

        let settings = Settings {
            worker_threads: 0,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(SettingsError::WorkerThreads)));

        assert!(Settings::default().validate().is_ok());
    }
}
