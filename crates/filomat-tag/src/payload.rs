//! JSON payloads carried in `application/json` MIME records.

use filomat_types::{Container, FilamentMetadata, TypeError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{TagError, TagResult};
use crate::ndef::{NdefMessage, NdefRecord};

/// Media type of structured tag payloads.
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Every wire field of [`FilamentMetadata`], in schema order.
const METADATA_FIELDS: [&str; 11] = [
    "protocol",
    "version",
    "type",
    "brand",
    "variant",
    "color_hex",
    "color",
    "min_temp",
    "max_temp",
    "bed_min_temp",
    "bed_max_temp",
];

/// Options controlling payload encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Fill absent `protocol`/`version` with their defaults and emit every
    /// other absent field as `null`. Off by default: only present fields are
    /// written.
    pub emit_defaults: bool,
}

/// Encode filament metadata as JSON bytes.
pub fn encode_metadata(metadata: &FilamentMetadata, options: EncodeOptions) -> TagResult<Vec<u8>> {
    if !options.emit_defaults {
        return serde_json::to_vec(metadata).map_err(|e| TagError::Payload(e.to_string()));
    }

    let filled = metadata.clone().with_protocol_defaults();
    let mut object = match serde_json::to_value(&filled) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(e) => return Err(TagError::Payload(e.to_string())),
    };
    for field in METADATA_FIELDS {
        object.entry(field).or_insert(Value::Null);
    }
    serde_json::to_vec(&Value::Object(object)).map_err(|e| TagError::Payload(e.to_string()))
}

/// Decode filament metadata from JSON bytes. Unknown fields are ignored and
/// absent fields stay unset.
pub fn decode_metadata(payload: &[u8]) -> TagResult<FilamentMetadata> {
    serde_json::from_slice(payload).map_err(|e| TagError::Payload(e.to_string()))
}

/// Build the single-record message written to a filament tag.
pub fn metadata_message(metadata: &FilamentMetadata, options: EncodeOptions) -> TagResult<NdefMessage> {
    let payload = encode_metadata(metadata, options)?;
    Ok(NdefMessage::single(NdefRecord::mime(JSON_MEDIA_TYPE, payload)))
}

/// Payload written to a container's tag.
///
/// `capacity` is a decimal string, empty when the container has none.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerTagData {
    pub name: String,
    pub description: String,
    pub capacity: String,
}

impl ContainerTagData {
    pub fn from_container(container: &Container) -> Self {
        Self {
            name: container.name.clone(),
            description: container.description.clone(),
            capacity: container.capacity.map(|c| c.to_string()).unwrap_or_default(),
        }
    }

    /// Parsed capacity; `None` when blank.
    pub fn capacity(&self) -> Result<Option<u32>, TypeError> {
        let raw = self.capacity.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse()
            .map(Some)
            .map_err(|_| TypeError::InvalidCapacity(raw.to_string()))
    }

    pub fn from_json(payload: &[u8]) -> TagResult<Self> {
        serde_json::from_slice(payload).map_err(|e| TagError::Payload(e.to_string()))
    }
}

/// Build the single-record message written to a container tag.
pub fn container_message(data: &ContainerTagData) -> TagResult<NdefMessage> {
    let payload = serde_json::to_vec(data).map_err(|e| TagError::Payload(e.to_string()))?;
    Ok(NdefMessage::single(NdefRecord::mime(JSON_MEDIA_TYPE, payload)))
}
