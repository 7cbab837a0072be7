use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use filomat_presets::PresetTable;
use filomat_tag::EncodeOptions;
use filomat_types::{FilamentMetadata, DEFAULT_PROTOCOL, DEFAULT_VERSION};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Looked up in the working directory when `--config` is not given.
pub const CONFIG_FILE: &str = "filomat.toml";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilomatConfig {
    pub data_path: PathBuf,
    pub presets_dir: Option<PathBuf>,
    /// Milliseconds between a tag write and the verifying read.
    pub settle_delay: u64,
    pub emit_defaults: bool,
    pub default_protocol: String,
    pub default_version: String,
}

impl Default for FilomatConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("filomat.json"),
            presets_dir: None,
            settle_delay: 800,
            emit_defaults: false,
            default_protocol: DEFAULT_PROTOCOL.to_string(),
            default_version: DEFAULT_VERSION.to_string(),
        }
    }
}

impl FilomatConfig {
    /// Load from `explicit` if given, else [`CONFIG_FILE`] if it exists,
    /// else defaults. An explicit path must exist.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if Path::new(CONFIG_FILE).exists() => Self::from_file(Path::new(CONFIG_FILE)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_toml(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_delay)
    }

    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            emit_defaults: self.emit_defaults,
        }
    }

    /// Normalize `metadata` for writing. With `emit_defaults`, absent
    /// `protocol`/`version` take the configured defaults.
    pub fn prepare(&self, metadata: &FilamentMetadata, options: EncodeOptions) -> FilamentMetadata {
        let mut metadata = metadata.normalized();
        if options.emit_defaults {
            metadata.protocol.get_or_insert_with(|| self.default_protocol.clone());
            metadata.version.get_or_insert_with(|| self.default_version.clone());
        }
        metadata
    }

    pub fn presets(&self) -> PresetTable {
        match &self.presets_dir {
            Some(dir) => PresetTable::load_dir(dir),
            None => PresetTable::fallback(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let c = FilomatConfig::default();
        assert_eq!(c.data_path, PathBuf::from("filomat.json"));
        assert_eq!(c.settle(), Duration::from_millis(800));
        assert!(!c.emit_defaults);
        assert!(c.presets_dir.is_none());
        assert_eq!(c.default_protocol, "openspool");
        assert_eq!(c.default_version, "1.0");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = FilomatConfig::from_toml("settle_delay = 50\nemit_defaults = true\n").unwrap();
        assert_eq!(c.settle_delay, 50);
        assert!(c.emit_defaults);
        assert_eq!(c.data_path, PathBuf::from("filomat.json"));
    }

    #[test]
    fn toml_roundtrip() {
        let c = FilomatConfig {
            presets_dir: Some("data".into()),
            ..Default::default()
        };
        assert_eq!(FilomatConfig::from_toml(&c.to_toml().unwrap()).unwrap(), c);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(FilomatConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn prepare_fills_protocol_only_when_emitting_defaults() {
        let meta = FilamentMetadata {
            color_hex: Some("#ff0000".into()),
            ..Default::default()
        };
        let config = FilomatConfig {
            default_protocol: "custom".into(),
            ..Default::default()
        };
        let off = config.prepare(&meta, config.encode_options());
        assert!(off.protocol.is_none());
        assert_eq!(off.color_hex.as_deref(), Some("ff0000"));

        let on = config.prepare(&meta, EncodeOptions { emit_defaults: true });
        assert_eq!(on.protocol.as_deref(), Some("custom"));
        assert_eq!(on.version.as_deref(), Some("1.0"));
    }
}
