// src/message.rs
use log::{debug, warn};

use crate::error::{NfcError, Result};
use crate::record::{ByteCursor, Record};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    records: Vec<Record>,
}

impl Message {
    /// Builds a message, setting Message-Begin on the first record,
    /// Message-End on the last and clearing both everywhere else.
    pub fn new(mut records: Vec<Record>) -> Self {
        let last = records.len().saturating_sub(1);
        for (i, record) in records.iter_mut().enumerate() {
            record.header.message_begin = i == 0;
            record.header.message_end = i == last;
        }
        Message { records }
    }

    pub fn empty() -> Self {
        Message::default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn decode(bytes: &[u8]) -> Result<Message> {
        let mut cursor = ByteCursor::new(bytes);
        let message = Message::decode_from(&mut cursor)?;
        if !cursor.is_empty() {
            warn!("Ignoring {} bytes after Message-End", cursor.remaining());
        }
        Ok(message)
    }

    pub fn decode_from(cursor: &mut ByteCursor<'_>) -> Result<Message> {
        let mut records: Vec<Record> = Vec::new();
        loop {
            if cursor.is_empty() {
                return Err(NfcError::MalformedMessage(format!(
                    "bytes ran out after {} records without Message-End",
                    records.len()
                )));
            }
            let record = Record::decode(cursor)?;
            if record.header.message_begin && !records.is_empty() {
                return Err(NfcError::MalformedMessage(format!(
                    "record {} claims Message-Begin",
                    records.len()
                )));
            }
            let end = record.header.message_end;
            records.push(record);
            if end {
                break;
            }
        }
        debug!("Decoded message of {} records", records.len());
        Ok(Message { records })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let normalized = Message::new(self.records.clone());
        let mut out = Vec::new();
        for record in &normalized.records {
            out.extend(record.encode()?);
        }
        Ok(out)
    }
}

impl From<Vec<Record>> for Message {
    fn from(records: Vec<Record>) -> Self {
        Message::new(records)
    }
}

impl From<Record> for Message {
    fn from(record: Record) -> Self {
        Message::new(vec![record])
    }
}
