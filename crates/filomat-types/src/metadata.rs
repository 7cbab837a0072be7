use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Protocol name written when a tag payload is encoded with defaults.
pub const DEFAULT_PROTOCOL: &str = "openspool";
/// Protocol version written when a tag payload is encoded with defaults.
pub const DEFAULT_VERSION: &str = "1.0";

/// Structured filament descriptor carried in a tag's JSON payload.
///
/// Field names are the wire contract. Every field is optional: an absent
/// field decodes to `None`, unknown fields are ignored, and absent fields are
/// not emitted on encode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FilamentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// RGB or RGBA hex without a leading `#`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_hex: Option<String>,
    /// Human-readable color label.
    #[serde(rename = "color", skip_serializing_if = "Option::is_none")]
    pub color_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_temp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_temp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bed_min_temp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bed_max_temp: Option<String>,
}

impl FilamentMetadata {
    /// Returns `true` if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Trim every field, drop blank ones, and strip a leading `#` from
    /// `color_hex`.
    pub fn normalized(&self) -> Self {
        fn clean(v: &Option<String>) -> Option<String> {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        }

        let color_hex = clean(&self.color_hex)
            .map(|hex| hex.strip_prefix('#').map(str::to_string).unwrap_or(hex))
            .filter(|hex| !hex.is_empty());

        Self {
            protocol: clean(&self.protocol),
            version: clean(&self.version),
            material: clean(&self.material),
            brand: clean(&self.brand),
            variant: clean(&self.variant),
            color_hex,
            color_name: clean(&self.color_name),
            min_temp: clean(&self.min_temp),
            max_temp: clean(&self.max_temp),
            bed_min_temp: clean(&self.bed_min_temp),
            bed_max_temp: clean(&self.bed_max_temp),
        }
    }

    /// Check the constrained fields: `color_hex` must be 6 or 8 hex digits
    /// and temperatures must be decimal digits.
    pub fn validate(&self) -> Result<(), TypeError> {
        if let Some(hex) = &self.color_hex {
            let valid_len = hex.len() == 6 || hex.len() == 8;
            if !valid_len || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(TypeError::InvalidColorHex { value: hex.clone() });
            }
        }

        let temps = [
            ("min_temp", &self.min_temp),
            ("max_temp", &self.max_temp),
            ("bed_min_temp", &self.bed_min_temp),
            ("bed_max_temp", &self.bed_max_temp),
        ];
        for (field, value) in temps {
            if let Some(v) = value {
                if v.is_empty() || !v.chars().all(|c| c.is_ascii_digit()) {
                    return Err(TypeError::InvalidTemperature {
                        field,
                        value: v.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Fill in `protocol` and `version` when absent.
    pub fn with_protocol_defaults(mut self) -> Self {
        self.protocol.get_or_insert_with(|| DEFAULT_PROTOCOL.to_string());
        self.version.get_or_insert_with(|| DEFAULT_VERSION.to_string());
        self
    }

    /// `"<brand> <type> <variant>"` from the present parts, or `None` when
    /// none of them is set.
    pub fn display_title(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.brand, &self.material, &self.variant]
            .into_iter()
            .filter_map(|p| p.as_deref().map(str::trim))
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pla() -> FilamentMetadata {
        FilamentMetadata {
            protocol: Some("openspool".into()),
            version: Some("1.0".into()),
            material: Some("PLA".into()),
            brand: Some("Prusament".into()),
            color_hex: Some("FF8800".into()),
            min_temp: Some("190".into()),
            max_temp: Some("220".into()),
            ..Default::default()
        }
    }

    #[test]
    fn wire_field_names() {
        let meta = FilamentMetadata {
            material: Some("PETG".into()),
            color_name: Some("Galaxy Black".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"type":"PETG","color":"Galaxy Black"}"#);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"{"type":"PLA","weight":"1000","brand":"Elegoo"}"#;
        let meta: FilamentMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.material.as_deref(), Some("PLA"));
        assert_eq!(meta.brand.as_deref(), Some("Elegoo"));
        assert!(meta.variant.is_none());
    }

    #[test]
    fn null_fields_decode_as_unset() {
        let json = r#"{"type":null,"brand":"Elegoo"}"#;
        let meta: FilamentMetadata = serde_json::from_str(json).unwrap();
        assert!(meta.material.is_none());
    }

    #[test]
    fn empty_object_is_empty() {
        let meta: FilamentMetadata = serde_json::from_str("{}").unwrap();
        assert!(meta.is_empty());
    }

    // -----------------------------------------------------------------------
    // Normalization
    // -----------------------------------------------------------------------

    #[test]
    fn normalized_strips_hash_and_blanks() {
        let meta = FilamentMetadata {
            brand: Some("  Elegoo ".into()),
            variant: Some("   ".into()),
            color_hex: Some("#00FF00".into()),
            ..Default::default()
        };
        let n = meta.normalized();
        assert_eq!(n.brand.as_deref(), Some("Elegoo"));
        assert!(n.variant.is_none());
        assert_eq!(n.color_hex.as_deref(), Some("00FF00"));
    }

    #[test]
    fn normalized_drops_lone_hash() {
        let meta = FilamentMetadata {
            color_hex: Some("#".into()),
            ..Default::default()
        };
        assert!(meta.normalized().color_hex.is_none());
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn valid_metadata_passes() {
        assert!(pla().validate().is_ok());
        let rgba = FilamentMetadata {
            color_hex: Some("FF8800CC".into()),
            ..Default::default()
        };
        assert!(rgba.validate().is_ok());
    }

    #[test]
    fn bad_color_hex_rejected() {
        for bad in ["FF88", "#FF8800", "GG8800", "FF88001"] {
            let meta = FilamentMetadata {
                color_hex: Some(bad.into()),
                ..Default::default()
            };
            assert!(
                matches!(meta.validate(), Err(TypeError::InvalidColorHex { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn bad_temperature_rejected() {
        let meta = FilamentMetadata {
            bed_max_temp: Some("60C".into()),
            ..Default::default()
        };
        assert_eq!(
            meta.validate(),
            Err(TypeError::InvalidTemperature {
                field: "bed_max_temp",
                value: "60C".into()
            })
        );
    }

    // -----------------------------------------------------------------------
    // Defaults and titles
    // -----------------------------------------------------------------------

    #[test]
    fn protocol_defaults_only_fill_absent() {
        let meta = FilamentMetadata {
            protocol: Some("custom".into()),
            ..Default::default()
        }
        .with_protocol_defaults();
        assert_eq!(meta.protocol.as_deref(), Some("custom"));
        assert_eq!(meta.version.as_deref(), Some(DEFAULT_VERSION));
    }

    #[test]
    fn display_title_joins_present_parts() {
        let mut meta = pla();
        assert_eq!(meta.display_title().as_deref(), Some("Prusament PLA"));
        meta.variant = Some("Silk".into());
        assert_eq!(meta.display_title().as_deref(), Some("Prusament PLA Silk"));
        assert!(FilamentMetadata::default().display_title().is_none());
    }
}
