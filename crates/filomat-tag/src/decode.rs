//! Classification of raw tag content.

use filomat_types::FilamentMetadata;
use tracing::{debug, warn};

use crate::ndef::NdefMessage;
use crate::payload::{decode_metadata, JSON_MEDIA_TYPE};

/// Hardware id bytes as uppercase hex, two digits per byte, no separators.
pub fn hardware_id_hex(id: &[u8]) -> String {
    hex::encode_upper(id)
}

/// What was found on a tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagContent {
    /// A JSON record that parsed into metadata.
    Structured(FilamentMetadata),
    /// A JSON record whose payload did not parse. The read still succeeds.
    MalformedJson { reason: String },
    /// A non-JSON record; its text is the logical identifier.
    Text,
    /// Nothing readable; the hardware id is the identifier.
    Blank,
}

/// Result of reading one tag. Reads never fail: the worst case is the
/// hardware id with no metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedTag {
    /// Logical identifier used to look the tag up in the store.
    pub identifier: String,
    /// Hardware id, hex-encoded.
    pub hardware_id: String,
    pub content: TagContent,
}

impl DecodedTag {
    /// A tag with no readable content.
    pub fn blank(hardware_id: &[u8]) -> Self {
        let hex = hardware_id_hex(hardware_id);
        Self {
            identifier: hex.clone(),
            hardware_id: hex,
            content: TagContent::Blank,
        }
    }

    pub fn metadata(&self) -> Option<&FilamentMetadata> {
        match &self.content {
            TagContent::Structured(meta) => Some(meta),
            _ => None,
        }
    }

    pub fn into_metadata(self) -> Option<FilamentMetadata> {
        match self.content {
            TagContent::Structured(meta) => Some(meta),
            _ => None,
        }
    }
}

/// Decode a tag from its hardware id and (optional) NDEF message.
///
/// Only the first record is considered:
/// - `application/json` MIME → metadata, identifier is the hardware id
///   (falls back to no metadata if the JSON is malformed);
/// - any other record → its text is the identifier;
/// - no record, an empty record, or unreadable text → hardware id.
pub fn decode_tag(hardware_id: &[u8], message: Option<&NdefMessage>) -> DecodedTag {
    let blank = DecodedTag::blank(hardware_id);
    let Some(record) = message.and_then(NdefMessage::first) else {
        debug!(tag = %blank.hardware_id, "tag carries no NDEF record");
        return blank;
    };
    if record.is_empty_record() {
        return blank;
    }

    if record.is_mime(JSON_MEDIA_TYPE) {
        return match decode_metadata(&record.payload) {
            Ok(meta) => DecodedTag {
                content: TagContent::Structured(meta),
                ..blank
            },
            Err(e) => {
                warn!(tag = %blank.hardware_id, error = %e, "malformed JSON payload; using hardware id");
                DecodedTag {
                    content: TagContent::MalformedJson {
                        reason: e.to_string(),
                    },
                    ..blank
                }
            }
        };
    }

    match record.text_content().map(|t| t.trim().to_string()) {
        Some(text) if !text.is_empty() => DecodedTag {
            identifier: text,
            content: TagContent::Text,
            ..blank
        },
        _ => {
            debug!(tag = %blank.hardware_id, "record has no usable text; using hardware id");
            blank
        }
    }
}
