//! Tag codec for Filomat.
//!
//! Serializes item and container metadata onto an NFC tag and parses
//! whatever a tag carries, including third-party content, without ever
//! failing a read.
//!
//! # Layers
//!
//! - [`ndef`]: NDEF record/message binary framing
//! - [`payload`]: JSON payloads for filament and container tags
//! - [`decode`]: classification of tag content into a logical identifier
//! - [`device`]: the hardware boundary ([`TagDevice`]) and read/write paths
//! - [`sim`]: an in-memory [`SimulatedTag`] for tests and tag images on disk

pub mod decode;
pub mod device;
pub mod error;
pub mod ndef;
pub mod payload;
pub mod sim;

pub use decode::{decode_tag, hardware_id_hex, DecodedTag, TagContent};
pub use device::{read_tag, write_message, write_metadata, TagDevice, TagTechnology, WriteReport};
pub use error::{NdefError, TagError, TagResult};
pub use ndef::{NdefMessage, NdefRecord, Tnf};
pub use payload::{
    container_message, decode_metadata, encode_metadata, metadata_message, ContainerTagData,
    EncodeOptions, JSON_MEDIA_TYPE,
};
pub use sim::{SimulatedTag, TagKind};
