// src/lib.rs
//! NDEF messages on MIFARE Classic 1K cards: TLV framing, record and message
//! codecs, and a block stream over sector-authenticated storage.

pub mod apdu;
pub mod config;
pub mod driver;
pub mod error;
pub mod hexdump;
pub mod key;
pub mod medium;
pub mod memory;
pub mod message;
pub mod payload;
pub mod record;
pub mod stream;
pub mod tag;
pub mod tlv;
pub mod types;

pub use driver::{TagDriver, TagInfo, TagSession};
pub use error::{NfcError, Result};
pub use key::{Key, KeyMode};
pub use medium::{Block, BlockAddress, BlockStore};
pub use message::Message;
pub use payload::Payload;
pub use record::{Record, RecordHeader, Tnf};
pub use stream::BlockStream;
pub use tag::{read_tag_messages, write_tag_messages};
pub use tlv::TlvEntry;
