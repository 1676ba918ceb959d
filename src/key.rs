// src/key.rs
use std::fmt;

use crate::error::{NfcError, Result};

pub const KEY_LEN: usize = 6;

// AUTHENT1A / AUTHENT1B command bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyMode {
    A = 0x60,
    B = 0x61,
}

impl TryFrom<u8> for KeyMode {
    type Error = NfcError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x60 => Ok(KeyMode::A),
            0x61 => Ok(KeyMode::B),
            _ => Err(NfcError::InvalidKey),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    bytes: [u8; KEY_LEN],
    mode: KeyMode,
}

impl Key {
    pub const DEFAULT: Key = Key::from_array([0xFF; KEY_LEN], KeyMode::A);
    pub const DEFAULT_B: Key = Key::from_array([0xFF; KEY_LEN], KeyMode::B);
    pub const MAD: Key = Key::from_array([0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5], KeyMode::A);
    // NFC Forum public key for NDEF sectors
    pub const NDEF: Key = Key::from_array([0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7], KeyMode::A);

    pub fn new(bytes: &[u8], mode: KeyMode) -> Result<Self> {
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| NfcError::InvalidKey)?;
        Ok(Key { bytes, mode })
    }

    pub const fn from_array(bytes: [u8; KEY_LEN], mode: KeyMode) -> Self {
        Key { bytes, mode }
    }

    pub fn from_raw(bytes: &[u8], mode: u8) -> Result<Self> {
        Key::new(bytes, KeyMode::try_from(mode)?)
    }

    pub fn from_hex(text: &str, mode: KeyMode) -> Result<Self> {
        let bytes = hex::decode(text.trim()).map_err(|_| NfcError::InvalidKey)?;
        Key::new(&bytes, mode)
    }

    pub fn bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    pub fn mode(&self) -> KeyMode {
        self.mode
    }
}

impl Default for Key {
    fn default() -> Self {
        Key::DEFAULT
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:?}, {})", self.mode, hex::encode(self.bytes))
    }
}

// Keys commonly found on MIFARE Classic cards in the wild, tried in order
pub const COMMON_KEYS: [Key; 10] = [
    Key::NDEF,
    Key::MAD,
    Key::DEFAULT,
    Key::DEFAULT_B,
    Key::from_array([0x00, 0x00, 0x00, 0x00, 0x00, 0x00], KeyMode::A),
    Key::from_array([0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xB5], KeyMode::A),
    Key::from_array([0x4D, 0x3A, 0x99, 0xC3, 0x51, 0xDD], KeyMode::A),
    Key::from_array([0x1A, 0x98, 0x2C, 0x7E, 0x45, 0x9A], KeyMode::A),
    Key::from_array([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF], KeyMode::A),
    Key::from_array([0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5], KeyMode::B),
];
