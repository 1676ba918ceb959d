// src/payload.rs
//! Read-only views of well-known payloads and builders for the records the
//! service writes. None of this changes the wire encoding of a record.

use crate::record::{Record, Tnf};

pub const TYPE_URI: u8 = 0x55; // 'U'
pub const TYPE_TEXT: u8 = 0x54; // 'T'

pub const URI_PREFIXES: [&str; 36] = [
    "",
    "http://www.",
    "https://www.",
    "http://",
    "https://",
    "tel:",
    "mailto:",
    "ftp://anonymous:anonymous@",
    "ftp://ftp.",
    "ftps://",
    "sftp://",
    "smb://",
    "nfs://",
    "ftp://",
    "dav://",
    "news:",
    "telnet://",
    "imap:",
    "rtsp://",
    "urn:",
    "pop:",
    "sip:",
    "sips:",
    "tftp:",
    "btspp://",
    "btl2cap://",
    "btgoep://",
    "tcpobex://",
    "irdaobex://",
    "file://",
    "urn:epc:id:",
    "urn:epc:tag:",
    "urn:epc:pat:",
    "urn:epc:raw:",
    "urn:epc:",
    "urn:nfc:",
];

pub fn uri_prefix(code: u8) -> &'static str {
    URI_PREFIXES.get(code as usize).copied().unwrap_or("")
}

pub fn abbreviate_uri(uri: &str) -> (u8, &str) {
    URI_PREFIXES
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, prefix)| uri.starts_with(**prefix))
        .max_by_key(|(_, prefix)| prefix.len())
        .map(|(code, prefix)| (code as u8, &uri[prefix.len()..]))
        .unwrap_or((0, uri))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<'a> {
    Uri(String),
    /// Text records are handed out as their raw payload (status byte,
    /// language code and text).
    Text(&'a [u8]),
    Opaque(&'a [u8]),
}

impl Record {
    pub fn is_well_known(&self, type_code: u8) -> bool {
        self.tnf() == Tnf::WellKnown && self.record_type == [type_code]
    }

    pub fn view(&self) -> Payload<'_> {
        if self.is_well_known(TYPE_URI) {
            if let Some(uri) = self.uri() {
                return Payload::Uri(uri);
            }
        }
        if self.is_well_known(TYPE_TEXT) {
            return Payload::Text(&self.payload);
        }
        Payload::Opaque(&self.payload)
    }

    pub fn uri(&self) -> Option<String> {
        if !self.is_well_known(TYPE_URI) {
            return None;
        }
        let (&code, rest) = self.payload.split_first()?;
        Some(format!("{}{}", uri_prefix(code), String::from_utf8_lossy(rest)))
    }

    pub fn uri_record(uri: &str) -> Record {
        let (code, rest) = abbreviate_uri(uri);
        let mut payload = Vec::with_capacity(rest.len() + 1);
        payload.push(code);
        payload.extend_from_slice(rest.as_bytes());
        Record::new(Tnf::WellKnown, &[TYPE_URI], None, payload)
    }

    pub fn text_record(language: &str, text: &str) -> Record {
        // language code length lives in the low 6 bits of the status byte
        let lang = language.as_bytes();
        let lang = &lang[..lang.len().min(0x3F)];
        let mut payload = Vec::with_capacity(1 + lang.len() + text.len());
        payload.push(lang.len() as u8);
        payload.extend_from_slice(lang);
        payload.extend_from_slice(text.as_bytes());
        Record::new(Tnf::WellKnown, &[TYPE_TEXT], None, payload)
    }

    pub fn external_record(domain_type: &str, payload: Vec<u8>) -> Record {
        Record::new(Tnf::External, domain_type.as_bytes(), None, payload)
    }

    pub fn mime_record(mime_type: &str, payload: Vec<u8>) -> Record {
        Record::new(Tnf::MediaType, mime_type.as_bytes(), None, payload)
    }
}
