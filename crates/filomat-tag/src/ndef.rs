//! NDEF record and message framing.
//!
//! Record layout:
//! ```text
//! [1 byte: MB|ME|CF|SR|IL|TNF]
//! [1 byte: type length]
//! [1 or 4 bytes: payload length (SR selects 1, big-endian otherwise)]
//! [0 or 1 byte: id length (present when IL)]
//! [type][id][payload]
//! ```

use bytes::{Buf, BufMut};

use crate::error::NdefError;

const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_CF: u8 = 0x20;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;

/// RTD type of a well-known Text record.
pub const RTD_TEXT: &[u8] = b"T";

/// Type Name Format of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tnf {
    Empty,
    WellKnown,
    MimeMedia,
    AbsoluteUri,
    External,
    Unknown,
    Unchanged,
    Reserved,
}

impl Tnf {
    pub fn from_bits(bits: u8) -> Self {
        match bits & TNF_MASK {
            0 => Self::Empty,
            1 => Self::WellKnown,
            2 => Self::MimeMedia,
            3 => Self::AbsoluteUri,
            4 => Self::External,
            5 => Self::Unknown,
            6 => Self::Unchanged,
            _ => Self::Reserved,
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::WellKnown => 1,
            Self::MimeMedia => 2,
            Self::AbsoluteUri => 3,
            Self::External => 4,
            Self::Unknown => 5,
            Self::Unchanged => 6,
            Self::Reserved => 7,
        }
    }
}

/// A single NDEF record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NdefRecord {
    pub tnf: Tnf,
    pub record_type: Vec<u8>,
    pub id: Vec<u8>,
    pub payload: Vec<u8>,
}

impl NdefRecord {
    pub fn new(tnf: Tnf, record_type: Vec<u8>, id: Vec<u8>, payload: Vec<u8>) -> Self {
        Self {
            tnf,
            record_type,
            id,
            payload,
        }
    }

    /// A MIME media record, e.g. `application/json`.
    pub fn mime(media_type: &str, payload: Vec<u8>) -> Self {
        Self::new(Tnf::MimeMedia, media_type.as_bytes().to_vec(), Vec::new(), payload)
    }

    /// A well-known Text record in UTF-8.
    pub fn text(language: &str, text: &str) -> Self {
        let lang = &language.as_bytes()[..language.len().min(0x3f)];
        let mut payload = Vec::with_capacity(1 + lang.len() + text.len());
        payload.put_u8(lang.len() as u8);
        payload.put_slice(lang);
        payload.put_slice(text.as_bytes());
        Self::new(Tnf::WellKnown, RTD_TEXT.to_vec(), Vec::new(), payload)
    }

    pub fn is_empty_record(&self) -> bool {
        self.tnf == Tnf::Empty
    }

    /// Returns `true` if this is a MIME record of the given media type
    /// (compared case-insensitively, parameters ignored).
    pub fn is_mime(&self, media_type: &str) -> bool {
        if self.tnf != Tnf::MimeMedia {
            return false;
        }
        let declared = String::from_utf8_lossy(&self.record_type);
        let base = declared.split(';').next().unwrap_or("").trim();
        base.eq_ignore_ascii_case(media_type)
    }

    pub fn is_text(&self) -> bool {
        self.tnf == Tnf::WellKnown && self.record_type == RTD_TEXT
    }

    /// The human text carried by this record.
    ///
    /// Text records have their status byte and language code stripped;
    /// any other record's payload is read as UTF-8. Returns `None` when the
    /// bytes are not valid text.
    pub fn text_content(&self) -> Option<String> {
        if !self.is_text() {
            return String::from_utf8(self.payload.clone()).ok();
        }
        let (&status, rest) = self.payload.split_first()?;
        let lang_len = (status & 0x3f) as usize;
        let body = rest.get(lang_len..)?;
        if status & 0x80 != 0 {
            let units: Vec<u16> = body
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).ok()
        } else {
            String::from_utf8(body.to_vec()).ok()
        }
    }

    fn is_short(&self) -> bool {
        self.payload.len() <= u8::MAX as usize
    }

    /// Encoded length of this record in bytes.
    pub fn byte_len(&self) -> usize {
        let payload_len_field = if self.is_short() { 1 } else { 4 };
        let id_len_field = if self.id.is_empty() { 0 } else { 1 };
        2 + payload_len_field
            + id_len_field
            + self.record_type.len()
            + self.id.len()
            + self.payload.len()
    }

    fn encode_into(&self, out: &mut Vec<u8>, first: bool, last: bool) -> Result<(), NdefError> {
        check_len("record type", self.record_type.len(), u8::MAX as usize)?;
        check_len("record id", self.id.len(), u8::MAX as usize)?;
        check_len("payload", self.payload.len(), u32::MAX as usize)?;

        let mut header = self.tnf.bits();
        if first {
            header |= FLAG_MB;
        }
        if last {
            header |= FLAG_ME;
        }
        if self.is_short() {
            header |= FLAG_SR;
        }
        if !self.id.is_empty() {
            header |= FLAG_IL;
        }

        out.put_u8(header);
        out.put_u8(self.record_type.len() as u8);
        if self.is_short() {
            out.put_u8(self.payload.len() as u8);
        } else {
            out.put_u32(self.payload.len() as u32);
        }
        if !self.id.is_empty() {
            out.put_u8(self.id.len() as u8);
        }
        out.put_slice(&self.record_type);
        out.put_slice(&self.id);
        out.put_slice(&self.payload);
        Ok(())
    }
}

fn check_len(field: &'static str, len: usize, max: usize) -> Result<(), NdefError> {
    if len > max {
        return Err(NdefError::FieldTooLong { field, len, max });
    }
    Ok(())
}

fn take(buf: &mut &[u8], n: usize) -> Result<Vec<u8>, NdefError> {
    if buf.remaining() < n {
        return Err(NdefError::Truncated {
            needed: n,
            remaining: buf.remaining(),
        });
    }
    let out = buf[..n].to_vec();
    buf.advance(n);
    Ok(out)
}

fn take_u8(buf: &mut &[u8]) -> Result<u8, NdefError> {
    if !buf.has_remaining() {
        return Err(NdefError::Truncated {
            needed: 1,
            remaining: 0,
        });
    }
    Ok(buf.get_u8())
}

fn take_u32(buf: &mut &[u8]) -> Result<u32, NdefError> {
    if buf.remaining() < 4 {
        return Err(NdefError::Truncated {
            needed: 4,
            remaining: buf.remaining(),
        });
    }
    Ok(buf.get_u32())
}

/// An ordered set of NDEF records, as stored on a tag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NdefMessage {
    pub records: Vec<NdefRecord>,
}

impl NdefMessage {
    pub fn new(records: Vec<NdefRecord>) -> Self {
        Self { records }
    }

    pub fn single(record: NdefRecord) -> Self {
        Self::new(vec![record])
    }

    pub fn first(&self) -> Option<&NdefRecord> {
        self.records.first()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Encoded size in bytes; what a tag's capacity is compared against.
    pub fn byte_len(&self) -> usize {
        self.records.iter().map(NdefRecord::byte_len).sum()
    }

    /// Encode to the NDEF binary form.
    pub fn encode(&self) -> Result<Vec<u8>, NdefError> {
        if self.records.is_empty() {
            return Err(NdefError::Empty);
        }
        let mut out = Vec::with_capacity(self.byte_len());
        let last = self.records.len() - 1;
        for (i, record) in self.records.iter().enumerate() {
            record.encode_into(&mut out, i == 0, i == last)?;
        }
        Ok(out)
    }

    /// Parse the NDEF binary form.
    ///
    /// Stops at the first record flagged ME; trailing bytes after it (tag
    /// memory padding) are ignored.
    pub fn parse(data: &[u8]) -> Result<Self, NdefError> {
        if data.is_empty() {
            return Err(NdefError::Empty);
        }

        let mut buf = data;
        let mut records = Vec::new();
        loop {
            let header = take_u8(&mut buf)?;
            if records.is_empty() && header & FLAG_MB == 0 {
                return Err(NdefError::MissingMessageBegin);
            }
            if header & FLAG_CF != 0 {
                return Err(NdefError::Chunked);
            }

            let type_len = take_u8(&mut buf)? as usize;
            let payload_len = if header & FLAG_SR != 0 {
                take_u8(&mut buf)? as usize
            } else {
                take_u32(&mut buf)? as usize
            };
            let id_len = if header & FLAG_IL != 0 {
                take_u8(&mut buf)? as usize
            } else {
                0
            };

            let record_type = take(&mut buf, type_len)?;
            let id = take(&mut buf, id_len)?;
            let payload = take(&mut buf, payload_len)?;
            records.push(NdefRecord {
                tnf: Tnf::from_bits(header),
                record_type,
                id,
                payload,
            });

            if header & FLAG_ME != 0 {
                return Ok(Self { records });
            }
            if !buf.has_remaining() {
                return Err(NdefError::MissingMessageEnd);
            }
        }
    }
}
