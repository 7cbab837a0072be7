//! The hardware boundary and the read/write paths over it.

use filomat_types::FilamentMetadata;
use tracing::{debug, info, warn};

use crate::decode::{decode_tag, hardware_id_hex, DecodedTag};
use crate::error::{TagError, TagResult};
use crate::ndef::NdefMessage;
use crate::payload::{metadata_message, EncodeOptions};

/// What a presented tag supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagTechnology {
    /// NDEF-formatted tag.
    Ndef { writable: bool, max_size: usize },
    /// Not yet NDEF-formatted, but can be formatted.
    Formatable,
    /// Neither.
    Unsupported,
}

/// One physical tag held in the field for the duration of a session.
///
/// Implemented by radio drivers; [`SimulatedTag`](crate::SimulatedTag) is the
/// in-memory implementation.
pub trait TagDevice: Send {
    /// Raw hardware identifier (UID).
    fn hardware_id(&self) -> &[u8];

    fn technology(&self) -> TagTechnology;

    /// Read the stored NDEF message. `Ok(None)` if the tag holds none.
    fn read_message(&mut self) -> TagResult<Option<NdefMessage>>;

    /// Overwrite the NDEF message of an NDEF-formatted tag.
    fn write_message(&mut self, message: &NdefMessage) -> TagResult<()>;

    /// Format an unformatted tag and write `message` in one step.
    fn format_and_write(&mut self, message: &NdefMessage) -> TagResult<()>;
}

/// Outcome of a successful write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteReport {
    pub bytes_written: usize,
    /// `true` if the tag was formatted as part of the write.
    pub formatted: bool,
}

/// Read and decode one tag. Never fails: read errors degrade to the
/// hardware id with no metadata.
pub fn read_tag(device: &mut dyn TagDevice) -> DecodedTag {
    let hardware_id = device.hardware_id().to_vec();
    match device.technology() {
        TagTechnology::Ndef { .. } => {}
        TagTechnology::Formatable | TagTechnology::Unsupported => {
            return DecodedTag::blank(&hardware_id);
        }
    }

    match device.read_message() {
        Ok(message) => decode_tag(&hardware_id, message.as_ref()),
        Err(e) => {
            warn!(tag = %hardware_id_hex(&hardware_id), error = %e, "tag read failed; using hardware id");
            DecodedTag::blank(&hardware_id)
        }
    }
}

/// Write a message after checking the tag can take it.
///
/// NDEF tags must report writable and have capacity for the encoded
/// message. Unformatted tags that support formatting are formatted and
/// written in one step.
pub fn write_message(device: &mut dyn TagDevice, message: &NdefMessage) -> TagResult<WriteReport> {
    let encoded_len = message.encode()?.len();
    let tag = hardware_id_hex(device.hardware_id());

    match device.technology() {
        TagTechnology::Ndef { writable, max_size } => {
            if !writable {
                return Err(TagError::NotWritable);
            }
            if max_size < encoded_len {
                return Err(TagError::TooSmall {
                    required: encoded_len,
                    capacity: max_size,
                });
            }
            device.write_message(message)?;
            info!(%tag, bytes = encoded_len, "tag written");
            Ok(WriteReport {
                bytes_written: encoded_len,
                formatted: false,
            })
        }
        TagTechnology::Formatable => {
            device.format_and_write(message)?;
            info!(%tag, bytes = encoded_len, "tag formatted and written");
            Ok(WriteReport {
                bytes_written: encoded_len,
                formatted: true,
            })
        }
        TagTechnology::Unsupported => {
            debug!(%tag, "write refused: no NDEF support");
            Err(TagError::Unsupported)
        }
    }
}

/// Normalize, validate, and write filament metadata.
pub fn write_metadata(
    device: &mut dyn TagDevice,
    metadata: &FilamentMetadata,
    options: EncodeOptions,
) -> TagResult<WriteReport> {
    let metadata = metadata.normalized();
    metadata.validate()?;
    let message = metadata_message(&metadata, options)?;
    write_message(device, &message)
}
