// src/tlv.rs
//! TLV area of an NDEF formatted tag.
//!
//! ```text
//! +------+--------------------------+----------------+
//! | type | length: 1 byte (0..=254) |  value         |
//! |      |   or 0xFF + 2 bytes BE   |  length bytes  |
//! +------+--------------------------+----------------+
//! ```
//!
//! NULL (0x00) and Terminator (0xFE) are single bytes without length or
//! value. Running out of data blocks where a type byte is expected counts
//! as a terminator.

use log::debug;

use crate::error::{NfcError, Result};
use crate::medium::{BLOCK_SIZE, BlockStore};
use crate::message::Message;
use crate::stream::BlockStream;

pub const TLV_NULL: u8 = 0x00;
pub const TLV_NDEF: u8 = 0x03;
pub const TLV_PROPRIETARY: u8 = 0xDF;
pub const TLV_TERMINATOR: u8 = 0xFE;

const LONG_LENGTH: u8 = 0xFF;
const MAX_TLV_LENGTH: usize = 0xFFFE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlvEntry {
    Ndef(Message),
    Proprietary(Vec<u8>),
    Unknown { tag: u8, value: Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Scanning,
    Terminated,
}

pub struct TlvScanner<'s, 'a, S: BlockStore> {
    stream: &'s mut BlockStream<'a, S>,
    state: ScanState,
}

impl<'s, 'a, S: BlockStore> TlvScanner<'s, 'a, S> {
    pub fn new(stream: &'s mut BlockStream<'a, S>) -> Self {
        TlvScanner {
            stream,
            state: ScanState::Scanning,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Next entry, or `None` once the terminator (explicit or implied by
    /// the end of the medium) has been reached.
    pub fn next_entry(&mut self) -> Result<Option<TlvEntry>> {
        loop {
            if self.state == ScanState::Terminated {
                return Ok(None);
            }
            let tag = match self.stream.next_byte() {
                Ok(tag) => tag,
                Err(NfcError::EndOfMedium) => {
                    debug!("Reached the end of the medium without a terminator");
                    self.state = ScanState::Terminated;
                    return Ok(None);
                }
                Err(err) => return Err(err),
            };

            match tag {
                TLV_NULL => continue,
                TLV_TERMINATOR => {
                    self.state = ScanState::Terminated;
                    return Ok(None);
                }
                _ => {}
            }

            let length = self.read_length()?;
            let value = self.stream.next_bytes(length)?;
            debug!("TLV 0x{:02x}, {} bytes", tag, length);

            let entry = match tag {
                // value is consumed already, so a bad message leaves the
                // scanner on the next TLV
                TLV_NDEF if value.is_empty() => TlvEntry::Ndef(Message::empty()),
                TLV_NDEF => TlvEntry::Ndef(Message::decode(&value)?),
                TLV_PROPRIETARY => TlvEntry::Proprietary(value),
                _ => TlvEntry::Unknown { tag, value },
            };
            return Ok(Some(entry));
        }
    }

    fn read_length(&mut self) -> Result<usize> {
        let first = self.stream.next_byte()?;
        if first != LONG_LENGTH {
            return Ok(first as usize);
        }
        let raw = self.stream.next_bytes(2)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]) as usize)
    }
}

pub fn read_entries<S: BlockStore>(stream: &mut BlockStream<'_, S>) -> Result<Vec<TlvEntry>> {
    let mut scanner = TlvScanner::new(stream);
    let mut entries = Vec::new();
    while let Some(entry) = scanner.next_entry()? {
        entries.push(entry);
    }
    Ok(entries)
}

fn push_length(out: &mut Vec<u8>, len: usize) -> Result<()> {
    if len < LONG_LENGTH as usize {
        out.push(len as u8);
    } else if len <= MAX_TLV_LENGTH {
        out.push(LONG_LENGTH);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        return Err(NfcError::CapacityExceeded {
            required: len.div_ceil(BLOCK_SIZE),
            available: MAX_TLV_LENGTH / BLOCK_SIZE,
        });
    }
    Ok(())
}

fn push_entry(out: &mut Vec<u8>, tag: u8, value: &[u8]) -> Result<()> {
    out.push(tag);
    push_length(out, value.len())?;
    out.extend_from_slice(value);
    Ok(())
}

pub fn encode_entries(entries: &[TlvEntry]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for entry in entries {
        match entry {
            TlvEntry::Ndef(message) => push_entry(&mut out, TLV_NDEF, &message.encode()?)?,
            TlvEntry::Proprietary(value) => push_entry(&mut out, TLV_PROPRIETARY, value)?,
            TlvEntry::Unknown { tag, value } => push_entry(&mut out, *tag, value)?,
        }
    }
    out.push(TLV_TERMINATOR);
    Ok(out)
}

pub fn encode_messages(messages: &[Message]) -> Result<Vec<u8>> {
    let entries: Vec<TlvEntry> = messages.iter().cloned().map(TlvEntry::Ndef).collect();
    encode_entries(&entries)
}

/// Encodes and flushes the whole TLV area. Nothing is written when it does
/// not fit.
pub fn write_entries<S: BlockStore>(stream: &mut BlockStream<'_, S>, entries: &[TlvEntry]) -> Result<()> {
    let bytes = encode_entries(entries)?;
    stream.write_all(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::TagSession;
    use crate::key::Key;
    use crate::medium::NDEF_BLOCKS;
    use crate::memory::MemoryCard;
    use crate::record::Record;

    fn card_with(bytes: &[u8]) -> MemoryCard {
        let mut card = MemoryCard::default();
        for (chunk, addr) in bytes.chunks(BLOCK_SIZE).zip(NDEF_BLOCKS.iter()) {
            let mut block = [0u8; BLOCK_SIZE];
            block[..chunk.len()].copy_from_slice(chunk);
            card.set_block(addr.value(), block);
        }
        card
    }

    fn scan(card: &mut MemoryCard) -> Result<Vec<TlvEntry>> {
        let session = TagSession::open(card)?;
        let mut stream = BlockStream::new(session, &NDEF_BLOCKS, Key::DEFAULT);
        read_entries(&mut stream)
    }

    #[test]
    fn stops_at_terminator_without_reading_on() {
        let mut card = card_with(&[0x03, 0x03, 0xD0, 0x00, 0x00, 0xFE]);
        // anything past the terminator must stay unread
        card.fail_reads_at(0x05);
        let entries = scan(&mut card).unwrap();
        assert_eq!(entries, vec![TlvEntry::Ndef(Message::from(Record::empty()))]);
        assert_eq!(card.reads(), 1);
    }

    #[test]
    fn skips_null_and_unknown_entries() {
        let mut card = card_with(&[
            0x00, 0x00, 0x01, 0x03, 0xA0, 0x0C, 0x44, 0xDF, 0x02, 0xBE, 0xEF, 0x03, 0x00, 0xFE,
        ]);
        let entries = scan(&mut card).unwrap();
        assert_eq!(
            entries,
            vec![
                TlvEntry::Unknown { tag: 0x01, value: vec![0xA0, 0x0C, 0x44] },
                TlvEntry::Proprietary(vec![0xBE, 0xEF]),
                TlvEntry::Ndef(Message::empty()),
            ]
        );
    }

    #[test]
    fn end_of_medium_is_an_implicit_terminator() {
        // every data block is NULL padding
        let mut card = MemoryCard::default();
        assert!(scan(&mut card).unwrap().is_empty());
        assert_eq!(card.reads(), NDEF_BLOCKS.len());
    }

    #[test]
    fn end_of_medium_inside_a_value_is_an_error() {
        let mut bytes = vec![0u8; NDEF_BLOCKS.len() * BLOCK_SIZE];
        let at = bytes.len() - 3;
        bytes[at] = 0xDF;
        bytes[at + 1] = 0x05;
        let mut card = card_with(&bytes);
        assert_eq!(scan(&mut card), Err(NfcError::EndOfMedium));
    }

    #[test]
    fn truncated_record_in_value_is_malformed() {
        // TLV says 4 bytes, the record inside claims 9 bytes of payload
        let mut card = card_with(&[0x03, 0x04, 0xD1, 0x01, 0x09, 0x55, 0xFE]);
        assert!(matches!(scan(&mut card), Err(NfcError::MalformedRecord(_))));
    }

    #[test]
    fn long_length_form() {
        let short = encode_entries(&[TlvEntry::Proprietary(vec![0; 254])]).unwrap();
        assert_eq!(&short[..2], &[0xDF, 0xFE]);
        assert_eq!(short.len(), 2 + 254 + 1);

        let long = encode_entries(&[TlvEntry::Proprietary(vec![0; 255])]).unwrap();
        assert_eq!(&long[..4], &[0xDF, 0xFF, 0x00, 0xFF]);
        assert_eq!(long.len(), 4 + 255 + 1);

        let mut card = card_with(&long);
        assert_eq!(scan(&mut card).unwrap(), vec![TlvEntry::Proprietary(vec![0; 255])]);
    }

    #[test]
    fn encodes_messages_with_terminator() {
        let message = Message::from(Record::uri_record("https://example.com"));
        let bytes = encode_messages(&[message.clone()]).unwrap();
        let body = message.encode().unwrap();
        assert_eq!(bytes[0], TLV_NDEF);
        assert_eq!(bytes[1] as usize, body.len());
        assert_eq!(&bytes[2..2 + body.len()], body.as_slice());
        assert_eq!(bytes.last(), Some(&TLV_TERMINATOR));
    }

    #[test]
    fn scanner_tracks_state() {
        let mut card = card_with(&[0x03, 0x00, 0xFE]);
        let session = TagSession::open(&mut card).unwrap();
        let mut stream = BlockStream::new(session, &NDEF_BLOCKS, Key::DEFAULT);
        let mut scanner = TlvScanner::new(&mut stream);
        assert_eq!(scanner.state(), ScanState::Scanning);
        assert!(scanner.next_entry().unwrap().is_some());
        assert_eq!(scanner.state(), ScanState::Scanning);
        assert_eq!(scanner.next_entry().unwrap(), None);
        assert_eq!(scanner.state(), ScanState::Terminated);
        assert_eq!(scanner.next_entry().unwrap(), None);
    }

    #[test]
    fn scanner_moves_past_a_bad_message() {
        // NDEF TLV whose only record lacks Message-End, then a proprietary TLV
        let mut card = card_with(&[
            0x03, 0x05, 0x91, 0x01, 0x01, 0x55, 0x00, 0xDF, 0x01, 0xAA, 0xFE,
        ]);
        let session = TagSession::open(&mut card).unwrap();
        let mut stream = BlockStream::new(session, &NDEF_BLOCKS, Key::DEFAULT);
        let mut scanner = TlvScanner::new(&mut stream);
        assert!(matches!(scanner.next_entry(), Err(NfcError::MalformedMessage(_))));
        assert_eq!(scanner.state(), ScanState::Scanning);
        assert_eq!(
            scanner.next_entry().unwrap(),
            Some(TlvEntry::Proprietary(vec![0xAA]))
        );
        assert_eq!(scanner.next_entry().unwrap(), None);
        assert_eq!(scanner.state(), ScanState::Terminated);
    }
}
