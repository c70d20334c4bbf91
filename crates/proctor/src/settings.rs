//! Layered settings: defaults, optional TOML file, then `PROCTOR_*` env vars

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use assessment_session::SessionConfig;
use device_guard::DeviceConfig;
use face_detection::FaceConfig;
use focus_guard::FocusConfig;
use noise_detection::NoiseConfig;

use crate::SettingsError;

/// Process-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// trace, debug, info, warn or error
    pub log_level: String,
    pub log_json: bool,
    /// SQLite file holding session records; in-memory when unset
    pub store_path: Option<PathBuf>,
    pub session: SessionConfig,
    pub face: FaceConfig,
    pub noise: NoiseConfig,
    pub focus: FocusConfig,
    pub device: DeviceConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            store_path: None,
            session: SessionConfig::default(),
            face: FaceConfig::default(),
            noise: NoiseConfig::default(),
            focus: FocusConfig::default(),
            device: DeviceConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings, e.g. `PROCTOR_SESSION__GRACE_PERIOD_MS=0` overrides
    /// `session.grace_period_ms`
    pub fn load(path: Option<&str>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("PROCTOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.level()?;
        Ok(settings)
    }

    pub fn level(&self) -> Result<tracing::Level, SettingsError> {
        self.log_level
            .parse()
            .map_err(|_| SettingsError::InvalidLogLevel(self.log_level.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.level().unwrap(), tracing::Level::INFO);
        assert_eq!(settings.session.grace_period_ms, 5_000);
        assert_eq!(settings.face.sample_interval_ms, 100);
        assert_eq!(settings.focus.poll_interval_ms, 1_000);
        assert_eq!(settings.device.phone_max_width, 600);
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("proctor-{}.toml", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            r#"
log_level = "debug"
store_path = "/var/lib/proctor/sessions.db"

[noise]
threshold = 0.35

[session]
grace_period_ms = 2000
"#,
        )
        .unwrap();

        let settings = Settings::load(path.to_str()).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(settings.level().unwrap(), tracing::Level::DEBUG);
        assert_eq!(settings.store_path, Some(PathBuf::from("/var/lib/proctor/sessions.db")));
        assert!((settings.noise.threshold - 0.35).abs() < 1e-6);
        assert!((settings.noise.release_ratio - 0.8).abs() < 1e-6);
        assert_eq!(settings.session.grace_period_ms, 2_000);
        assert_eq!(settings.session.debounce_ms, 1_000);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(matches!(
            Settings::load(Some("/nonexistent/proctor-settings")),
            Err(SettingsError::Load(_))
        ));
    }

    #[test]
    fn test_invalid_level_rejected() {
        let settings = Settings {
            log_level: "loud".into(),
            ..Default::default()
        };
        assert!(matches!(settings.level(), Err(SettingsError::InvalidLogLevel(_))));
    }
}
