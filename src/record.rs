// src/record.rs
use log::debug;

use crate::error::{NfcError, Result};

// Header bit layout: MB | ME | CF | SR | IL | TNF(3)
const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_CF: u8 = 0x20;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;

pub const SHORT_RECORD_MAX: usize = 254;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tnf {
    Empty = 0x00,
    WellKnown = 0x01,
    MediaType = 0x02,
    AbsoluteUri = 0x03,
    External = 0x04,
    Unknown = 0x05,
    Unchanged = 0x06,
    Reserved = 0x07,
}

impl Tnf {
    pub fn from_bits(bits: u8) -> Self {
        match bits & TNF_MASK {
            0x00 => Tnf::Empty,
            0x01 => Tnf::WellKnown,
            0x02 => Tnf::MediaType,
            0x03 => Tnf::AbsoluteUri,
            0x04 => Tnf::External,
            0x05 => Tnf::Unknown,
            0x06 => Tnf::Unchanged,
            _ => Tnf::Reserved,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub message_begin: bool,
    pub message_end: bool,
    pub chunked: bool,
    pub short_record: bool,
    pub id_length_present: bool,
    pub tnf: Tnf,
}

impl RecordHeader {
    pub fn from_byte(byte: u8) -> Self {
        RecordHeader {
            message_begin: byte & FLAG_MB != 0,
            message_end: byte & FLAG_ME != 0,
            chunked: byte & FLAG_CF != 0,
            short_record: byte & FLAG_SR != 0,
            id_length_present: byte & FLAG_IL != 0,
            tnf: Tnf::from_bits(byte),
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut byte = self.tnf as u8;
        if self.message_begin {
            byte |= FLAG_MB;
        }
        if self.message_end {
            byte |= FLAG_ME;
        }
        if self.chunked {
            byte |= FLAG_CF;
        }
        if self.short_record {
            byte |= FLAG_SR;
        }
        if self.id_length_present {
            byte |= FLAG_IL;
        }
        byte
    }
}

/// Read cursor over an immutable byte buffer. Running off the end is a
/// malformed record, never a panic.
#[derive(Debug)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteCursor { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn byte(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    pub fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(NfcError::MalformedRecord(format!(
                "{} needs {} bytes, only {} left",
                what,
                n,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}

/// Big-endian integer value of `bytes`, kept as its minimal byte string
/// (leading zero bytes dropped, zero is the empty string).
pub fn accumulate(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

// Minimal big-endian width of an accumulated value, with a floor
fn field_width(value: &[u8], min: usize) -> usize {
    value.len().max(min)
}

fn push_field(out: &mut Vec<u8>, value: &[u8], width: usize) {
    out.extend(std::iter::repeat_n(0u8, width - value.len()));
    out.extend_from_slice(value);
}

/// A single NDEF record.
///
/// `record_type` and `id` hold the big-endian value of the wire field in its
/// minimal form (see [`accumulate`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub header: RecordHeader,
    pub record_type: Vec<u8>,
    pub id: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(tnf: Tnf, record_type: &[u8], id: Option<&[u8]>, payload: Vec<u8>) -> Self {
        let header = RecordHeader {
            message_begin: false,
            message_end: false,
            chunked: false,
            short_record: payload.len() <= SHORT_RECORD_MAX,
            id_length_present: id.is_some(),
            tnf,
        };
        Record {
            header,
            record_type: accumulate(record_type),
            id: id.map(accumulate),
            payload,
        }
    }

    pub fn empty() -> Self {
        Record::new(Tnf::Empty, &[], None, Vec::new())
    }

    pub fn tnf(&self) -> Tnf {
        self.header.tnf
    }

    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Record> {
        let header = RecordHeader::from_byte(cursor.byte("record header")?);
        if header.chunked {
            return Err(NfcError::UnsupportedChunking);
        }

        let type_length = cursor.byte("type length")? as usize;
        let payload_length = if header.short_record {
            cursor.byte("payload length")? as usize
        } else {
            let raw = cursor.take(4, "payload length")?;
            u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
        };
        let id_length = if header.id_length_present {
            Some(cursor.byte("id length")? as usize)
        } else {
            None
        };

        let record_type = accumulate(cursor.take(type_length, "type field")?);
        let id = match id_length {
            Some(len) => Some(accumulate(cursor.take(len, "id field")?)),
            None => None,
        };
        let payload = cursor.take(payload_length, "payload")?.to_vec();

        debug!(
            "Decoded record: TNF {:?}, type {}, {} payload bytes",
            header.tnf,
            hex::encode(&record_type),
            payload.len()
        );
        Ok(Record {
            header,
            record_type,
            id,
            payload,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let short_record = self.payload.len() <= SHORT_RECORD_MAX;
        let header = RecordHeader {
            chunked: false,
            short_record,
            id_length_present: self.id.is_some(),
            ..self.header
        };

        // An Empty record carries no type at all
        let type_min = if header.tnf == Tnf::Empty { 0 } else { 1 };
        let type_width = field_width(&self.record_type, type_min);
        let id_width = self.id.as_deref().map(|id| field_width(id, 1));

        if type_width > u8::MAX as usize {
            return Err(NfcError::MalformedRecord(format!(
                "type field of {} bytes does not fit its length byte",
                type_width
            )));
        }
        if id_width.is_some_and(|w| w > u8::MAX as usize) {
            return Err(NfcError::MalformedRecord(
                "id field does not fit its length byte".into(),
            ));
        }
        let payload_length = u32::try_from(self.payload.len()).map_err(|_| {
            NfcError::MalformedRecord("payload longer than 4 GiB".into())
        })?;

        let mut out = Vec::with_capacity(6 + type_width + self.payload.len());
        out.push(header.to_byte());
        out.push(type_width as u8);
        if short_record {
            out.push(payload_length as u8);
        } else {
            out.extend_from_slice(&payload_length.to_be_bytes());
        }
        if let Some(width) = id_width {
            out.push(width as u8);
        }
        push_field(&mut out, &self.record_type, type_width);
        if let (Some(id), Some(width)) = (self.id.as_deref(), id_width) {
            push_field(&mut out, id, width);
        }
        out.extend_from_slice(&self.payload);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_bytes(bytes: &[u8]) -> Result<Record> {
        Record::decode(&mut ByteCursor::new(bytes))
    }

    #[test]
    fn header_bits() {
        let header = RecordHeader::from_byte(0xD1);
        assert!(header.message_begin && header.message_end && header.short_record);
        assert!(!header.chunked && !header.id_length_present);
        assert_eq!(header.tnf, Tnf::WellKnown);
        assert_eq!(header.to_byte(), 0xD1);
        assert_eq!(RecordHeader::from_byte(0x1D).tnf, Tnf::Reserved);
    }

    #[test]
    fn decodes_short_uri_record() {
        let bytes = [0xD1, 0x01, 0x04, 0x55, 0x04, b'a', b'.', b'b'];
        let record = decode_bytes(&bytes).unwrap();
        assert_eq!(record.tnf(), Tnf::WellKnown);
        assert_eq!(record.record_type, vec![0x55]);
        assert_eq!(record.id, None);
        assert_eq!(record.payload, vec![0x04, b'a', b'.', b'b']);
    }

    #[test]
    fn decodes_long_form_with_id() {
        let mut bytes = vec![0xCA, 0x02, 0x00, 0x00, 0x01, 0x00, 0x02, b't', b'x', 0x00, 0x07];
        bytes.extend(vec![0x5A; 256]);
        let record = decode_bytes(&bytes).unwrap();
        assert!(!record.header.short_record);
        assert_eq!(record.tnf(), Tnf::MediaType);
        assert_eq!(record.record_type, b"tx".to_vec());
        // leading zero byte of the id field folds into the value
        assert_eq!(record.id, Some(vec![0x07]));
        assert_eq!(record.payload.len(), 256);
    }

    #[test]
    fn truncated_payload_is_malformed() {
        let bytes = [0xD1, 0x01, 0x05, 0x55, 0x04, b'a'];
        assert!(matches!(decode_bytes(&bytes), Err(NfcError::MalformedRecord(_))));
        assert!(matches!(decode_bytes(&[0xD1]), Err(NfcError::MalformedRecord(_))));
        assert!(matches!(decode_bytes(&[0x81, 0x01, 0x00, 0x00]), Err(NfcError::MalformedRecord(_))));
    }

    #[test]
    fn chunked_records_are_rejected() {
        let bytes = [0xB1, 0x01, 0x01, 0x55, 0x00];
        assert_eq!(decode_bytes(&bytes), Err(NfcError::UnsupportedChunking));
    }

    #[test]
    fn short_form_boundary() {
        let short = Record::new(Tnf::Unknown, &[0x01], None, vec![0; 254]).encode().unwrap();
        assert_eq!(short[0] & FLAG_SR, FLAG_SR);
        assert_eq!(short[2], 254);
        assert_eq!(short.len(), 3 + 1 + 254);

        let long = Record::new(Tnf::Unknown, &[0x01], None, vec![0; 255]);
        let bytes = long.encode().unwrap();
        assert_eq!(bytes[0] & FLAG_SR, 0);
        assert_eq!(&bytes[2..6], &[0x00, 0x00, 0x00, 0xFF]);
        assert_eq!(bytes.len(), 6 + 1 + 255);
        assert_eq!(decode_bytes(&bytes).unwrap(), long);
    }

    #[test]
    fn type_and_id_use_minimal_width() {
        let record = Record::new(Tnf::External, &[0x00, 0x01, 0x02], Some(&[0x00, 0x00]), vec![9]);
        let bytes = record.encode().unwrap();
        // header, type len, payload len, id len, type(2), id(1), payload
        assert_eq!(bytes, vec![0x1C, 0x02, 0x01, 0x01, 0x01, 0x02, 0x00, 0x09]);
        assert_eq!(decode_bytes(&bytes).unwrap(), record);
    }

    #[test]
    fn empty_record_has_no_type() {
        let bytes = Record::empty().encode().unwrap();
        assert_eq!(bytes, vec![0x10, 0x00, 0x00]);
        assert_eq!(decode_bytes(&bytes).unwrap(), Record::empty());
    }

    #[test]
    fn oversized_type_is_rejected() {
        let record = Record::new(Tnf::External, &[0x41; 256], None, vec![]);
        assert!(matches!(record.encode(), Err(NfcError::MalformedRecord(_))));
    }
}
