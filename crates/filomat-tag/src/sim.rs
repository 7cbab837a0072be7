//! In-memory tag, also used as the on-disk tag image format.
//!
//! ```json
//! { "hardwareId": "04A1B2C3", "kind": "ndef", "writable": true,
//!   "maxSize": 144, "message": "D2100E6170706C..." }
//! ```

use serde::{Deserialize, Serialize};

use crate::device::{TagDevice, TagTechnology};
use crate::error::{TagError, TagResult};
use crate::ndef::NdefMessage;

/// Technology of a simulated tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    Ndef,
    Formatable,
    Unsupported,
}

/// A tag whose memory is a byte buffer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedTag {
    #[serde(with = "hex_bytes")]
    hardware_id: Vec<u8>,
    kind: TagKind,
    #[serde(default = "default_writable")]
    writable: bool,
    #[serde(default)]
    max_size: usize,
    /// Raw NDEF bytes as stored in tag memory.
    #[serde(default, with = "hex_opt", skip_serializing_if = "Option::is_none")]
    message: Option<Vec<u8>>,
}

fn default_writable() -> bool {
    true
}

impl SimulatedTag {
    /// A blank, writable NDEF tag with `max_size` bytes of user memory.
    pub fn ndef(hardware_id: Vec<u8>, max_size: usize) -> Self {
        Self {
            hardware_id,
            kind: TagKind::Ndef,
            writable: true,
            max_size,
            message: None,
        }
    }

    /// An unformatted tag that becomes NDEF on first write.
    pub fn formatable(hardware_id: Vec<u8>, max_size: usize) -> Self {
        Self {
            kind: TagKind::Formatable,
            ..Self::ndef(hardware_id, max_size)
        }
    }

    pub fn unsupported(hardware_id: Vec<u8>) -> Self {
        Self {
            kind: TagKind::Unsupported,
            writable: false,
            ..Self::ndef(hardware_id, 0)
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Preload the tag with an encoded message.
    pub fn with_message(self, message: &NdefMessage) -> TagResult<Self> {
        Ok(self.with_raw_message(message.encode()?))
    }

    /// Preload the tag with arbitrary bytes, valid NDEF or not.
    pub fn with_raw_message(mut self, bytes: Vec<u8>) -> Self {
        self.message = Some(bytes);
        self
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    pub fn raw_message(&self) -> Option<&[u8]> {
        self.message.as_deref()
    }

    /// Load a tag image from JSON.
    pub fn from_json(json: &str) -> TagResult<Self> {
        serde_json::from_str(json).map_err(|e| TagError::Device(format!("invalid tag image: {e}")))
    }

    pub fn to_json(&self) -> TagResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| TagError::Device(e.to_string()))
    }

    fn store(&mut self, message: &NdefMessage) -> TagResult<()> {
        let bytes = message.encode()?;
        if bytes.len() > self.max_size {
            return Err(TagError::TooSmall {
                required: bytes.len(),
                capacity: self.max_size,
            });
        }
        self.message = Some(bytes);
        Ok(())
    }
}

impl TagDevice for SimulatedTag {
    fn hardware_id(&self) -> &[u8] {
        &self.hardware_id
    }

    fn technology(&self) -> TagTechnology {
        match self.kind {
            TagKind::Ndef => TagTechnology::Ndef {
                writable: self.writable,
                max_size: self.max_size,
            },
            TagKind::Formatable => TagTechnology::Formatable,
            TagKind::Unsupported => TagTechnology::Unsupported,
        }
    }

    fn read_message(&mut self) -> TagResult<Option<NdefMessage>> {
        match (&self.kind, &self.message) {
            (TagKind::Ndef, Some(bytes)) => Ok(Some(NdefMessage::parse(bytes)?)),
            (TagKind::Ndef, None) => Ok(None),
            _ => Err(TagError::Unsupported),
        }
    }

    fn write_message(&mut self, message: &NdefMessage) -> TagResult<()> {
        if self.kind != TagKind::Ndef {
            return Err(TagError::Unsupported);
        }
        if !self.writable {
            return Err(TagError::NotWritable);
        }
        self.store(message)
    }

    fn format_and_write(&mut self, message: &NdefMessage) -> TagResult<()> {
        if self.kind != TagKind::Formatable {
            return Err(TagError::Device("tag is not formatable".into()));
        }
        self.store(message)?;
        self.kind = TagKind::Ndef;
        Ok(())
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode_upper(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(d)?;
        hex::decode(raw.trim()).map_err(serde::de::Error::custom)
    }
}

mod hex_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&hex::encode_upper(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|r| hex::decode(r.trim()).map_err(serde::de::Error::custom))
            .transpose()
    }
}
