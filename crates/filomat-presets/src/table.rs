use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{PresetError, PresetResult};
use crate::preset::{fallback_presets, normalize_brand, Preset};

pub const PRESETS_FILE: &str = "presets.json";
pub const BRANDS_FILE: &str = "brands.json";
pub const VARIANTS_FILE: &str = "variants.json";

/// Read-only access to filament reference data.
pub trait PresetLookup: Send + Sync {
    /// The preset for `material`, preferring a brand-specific row and
    /// falling back to the brand-agnostic one.
    fn get_preset(&self, material: &str, brand: Option<&str>) -> Option<Preset>;

    /// Known brands, sorted.
    fn list_brands(&self) -> Vec<String>;

    /// Known variants (Silk, Matte, ...), sorted.
    fn list_variants(&self) -> Vec<String>;
}

/// In-memory preset table keyed by `(type, brand)`.
#[derive(Clone, Debug, Default)]
pub struct PresetTable {
    presets: BTreeMap<(String, Option<String>), Preset>,
    brands: BTreeSet<String>,
    variants: BTreeSet<String>,
}

impl PresetTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in fallback table.
    pub fn fallback() -> Self {
        let mut table = Self::new();
        for preset in fallback_presets() {
            table.upsert(preset);
        }
        table
    }

    /// Load `presets.json`, `brands.json`, and `variants.json` from `dir`.
    ///
    /// A missing or invalid presets file falls back to the built-in table.
    /// Missing or invalid brand and variant lists leave those lists empty.
    pub fn load_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut table = match read_json::<Vec<Preset>>(&dir.join(PRESETS_FILE)) {
            Ok(Some(presets)) => {
                let mut table = Self::new();
                let count = presets.len();
                table.upsert_all(presets);
                debug!(count, "presets loaded");
                table
            }
            Ok(None) => Self::fallback(),
            Err(e) => {
                warn!(error = %e, "using fallback presets");
                Self::fallback()
            }
        };

        match read_json::<Vec<String>>(&dir.join(BRANDS_FILE)) {
            Ok(Some(brands)) => table.add_brands(brands),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "ignoring brand list"),
        }
        match read_json::<Vec<String>>(&dir.join(VARIANTS_FILE)) {
            Ok(Some(variants)) => table.add_variants(variants),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "ignoring variant list"),
        }
        table
    }

    /// Insert or replace the row for the preset's `(type, brand)`.
    pub fn upsert(&mut self, preset: Preset) {
        let key = preset.key();
        let preset = Preset {
            brand: key.1.clone(),
            ..preset
        };
        self.presets.insert(key, preset);
    }

    pub fn upsert_all(&mut self, presets: impl IntoIterator<Item = Preset>) {
        for preset in presets {
            self.upsert(preset);
        }
    }

    /// Upsert every row of a `presets.json` document. Returns the row count.
    pub fn upsert_json(&mut self, json: &str) -> PresetResult<usize> {
        let presets: Vec<Preset> = serde_json::from_str(json).map_err(|e| PresetError::Parse {
            file: PRESETS_FILE.to_string(),
            reason: e.to_string(),
        })?;
        let count = presets.len();
        self.upsert_all(presets);
        Ok(count)
    }

    pub fn add_brands(&mut self, brands: impl IntoIterator<Item = String>) {
        self.brands.extend(clean_names(brands));
    }

    pub fn add_variants(&mut self, variants: impl IntoIterator<Item = String>) {
        self.variants.extend(clean_names(variants));
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn presets(&self) -> impl Iterator<Item = &Preset> {
        self.presets.values()
    }
}

impl PresetLookup for PresetTable {
    fn get_preset(&self, material: &str, brand: Option<&str>) -> Option<Preset> {
        if let Some(brand) = normalize_brand(brand) {
            if let Some(p) = self.presets.get(&(material.to_string(), Some(brand))) {
                return Some(p.clone());
            }
        }
        self.presets.get(&(material.to_string(), None)).cloned()
    }

    fn list_brands(&self) -> Vec<String> {
        self.brands.iter().cloned().collect()
    }

    fn list_variants(&self) -> Vec<String> {
        self.variants.iter().cloned().collect()
    }
}

fn clean_names(names: impl IntoIterator<Item = String>) -> impl Iterator<Item = String> {
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

/// `Ok(None)` when the file does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> PresetResult<Option<T>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| PresetError::Parse {
            file: path.display().to_string(),
            reason: e.to_string(),
        })
}
