// src/error.rs
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NfcError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NfcError {
    #[error("Key must be 6 bytes long with mode A (0x60) or B (0x61)")]
    InvalidKey,
    #[error("Block address 0x{0:02x} is outside the 1K card")]
    InvalidBlock(u8),
    #[error("Block 0x{0:02x} is not a data block, writing it could make the tag unusable")]
    NotDataBlock(u8),
    #[error("No tag in the field")]
    NoTag,
    #[error("Authentication failed for block 0x{block:02x}")]
    AuthFailure { block: u8 },
    #[error("Reading block 0x{block:02x} failed: {reason}")]
    ReadFailure { block: u8, reason: String },
    #[error("Writing block 0x{block:02x} failed: {reason}")]
    WriteFailure { block: u8, reason: String },
    #[error("Ran out of data blocks")]
    EndOfMedium,
    #[error("Data too long: {required} blocks required, but only {available} available")]
    CapacityExceeded { required: usize, available: usize },
    #[error("Malformed NDEF record: {0}")]
    MalformedRecord(String),
    #[error("Malformed NDEF message: {0}")]
    MalformedMessage(String),
    #[error("Chunked NDEF records are not supported")]
    UnsupportedChunking,
    #[error("Reader error: {0}")]
    Reader(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<pcsc::Error> for NfcError {
    fn from(err: pcsc::Error) -> Self {
        NfcError::Reader(err.to_string())
    }
}
