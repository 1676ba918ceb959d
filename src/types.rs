// src/types.rs
use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::record::Record;

// Messages sent TO the WebSocket client (Frontend)
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutgoingMessage {
    ReaderStatus { success: bool },
    CardStatus { success: bool, message: String },
    DataReadSuccess { uid: String, messages: Vec<Vec<RecordView>> },
    DataReadError { error: String },
    DataWriteSuccess { message: String },
    DataWriteError { error: String },
    ReaderError { error: String },
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct RecordView {
    pub tnf: u8,
    pub record_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl From<&Record> for RecordView {
    fn from(record: &Record) -> Self {
        RecordView {
            tnf: record.tnf() as u8,
            record_type: hex::encode(&record.record_type),
            id: record.id.as_ref().map(hex::encode),
            payload: hex::encode(&record.payload),
            uri: record.uri(),
        }
    }
}

pub fn message_views(messages: &[Message]) -> Vec<Vec<RecordView>> {
    messages
        .iter()
        .map(|m| m.records().iter().map(RecordView::from).collect())
        .collect()
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NdefType {
    Text,
    Url,
    App,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct NdefPayload {
    pub data_type: NdefType,
    pub content: String,
}

impl From<&NdefPayload> for Record {
    fn from(p: &NdefPayload) -> Self {
        match p.data_type {
            NdefType::Text => Record::text_record("en", &p.content),
            NdefType::Url => Record::uri_record(&p.content),
            // Android Application Record: just the package name
            NdefType::App => Record::external_record("android.com:pkg", p.content.as_bytes().to_vec()),
        }
    }
}

// Messages received FROM the WebSocket client
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncomingMessage {
    GetReaderStatus,
    WriteData { payloads: Vec<NdefPayload> },
}

// Internal commands sent from WS Server -> NFC Thread
#[derive(Debug, Clone)]
pub enum NfcCommand {
    Write { payloads: Vec<NdefPayload> },
    CheckReaderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Tnf;

    #[test]
    fn parses_incoming_messages() {
        let status: IncomingMessage = serde_json::from_str(r#"{"type":"GET_READER_STATUS"}"#).unwrap();
        assert_eq!(status, IncomingMessage::GetReaderStatus);

        let write: IncomingMessage = serde_json::from_str(
            r#"{"type":"WRITE_DATA","payloads":[{"data_type":"URL","content":"https://example.com"}]}"#,
        )
        .unwrap();
        assert_eq!(
            write,
            IncomingMessage::WriteData {
                payloads: vec![NdefPayload {
                    data_type: NdefType::Url,
                    content: "https://example.com".into(),
                }],
            }
        );
    }

    #[test]
    fn payloads_become_records() {
        let app = NdefPayload {
            data_type: NdefType::App,
            content: "org.example".into(),
        };
        let record = Record::from(&app);
        assert_eq!(record.tnf(), Tnf::External);
        assert_eq!(record.record_type, b"android.com:pkg".to_vec());
    }

    #[test]
    fn serializes_read_results() {
        let message = Message::from(Record::uri_record("https://example.com"));
        let event = OutgoingMessage::DataReadSuccess {
            uid: "deadbeef".into(),
            messages: message_views(&[message]),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "DATA_READ_SUCCESS");
        assert_eq!(json["messages"][0][0]["uri"], "https://example.com");
        assert_eq!(json["messages"][0][0]["record_type"], "55");
        assert!(json["messages"][0][0].get("id").is_none());
    }
}
