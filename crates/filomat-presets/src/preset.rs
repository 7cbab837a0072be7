use filomat_types::FilamentMetadata;
use serde::{Deserialize, Serialize};

/// Recommended print temperatures for a material, optionally per brand.
///
/// Field names follow `presets.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(rename = "type")]
    pub material: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub min_temp: String,
    pub max_temp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bed_min_temp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bed_max_temp: Option<String>,
}

impl Preset {
    /// A brand-agnostic preset with bed temperatures.
    pub fn generic(material: &str, nozzle: (u16, u16), bed: (u16, u16)) -> Self {
        Self {
            material: material.to_string(),
            brand: None,
            min_temp: nozzle.0.to_string(),
            max_temp: nozzle.1.to_string(),
            bed_min_temp: Some(bed.0.to_string()),
            bed_max_temp: Some(bed.1.to_string()),
        }
    }

    /// Table key; a blank brand is the same as no brand.
    pub(crate) fn key(&self) -> (String, Option<String>) {
        (self.material.clone(), normalize_brand(self.brand.as_deref()))
    }

    /// Fill the temperature fields of `metadata` that are not already set.
    pub fn fill(&self, metadata: &mut FilamentMetadata) {
        metadata.min_temp.get_or_insert_with(|| self.min_temp.clone());
        metadata.max_temp.get_or_insert_with(|| self.max_temp.clone());
        if metadata.bed_min_temp.is_none() {
            metadata.bed_min_temp = self.bed_min_temp.clone();
        }
        if metadata.bed_max_temp.is_none() {
            metadata.bed_max_temp = self.bed_max_temp.clone();
        }
    }
}

pub(crate) fn normalize_brand(brand: Option<&str>) -> Option<String> {
    brand
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
}

/// Built-in table used when no `presets.json` is available.
pub fn fallback_presets() -> Vec<Preset> {
    vec![
        Preset::generic("PLA", (190, 220), (50, 60)),
        Preset::generic("PETG", (220, 250), (70, 80)),
        Preset::generic("TPU", (220, 250), (40, 60)),
        Preset::generic("ABS", (230, 260), (80, 100)),
        Preset::generic("ASA", (240, 270), (80, 100)),
    ]
}
