// src/apdu.rs
// PC/SC pseudo-APDUs understood by ACR122U style contactless readers
use log::debug;
use pcsc::Card;

use crate::driver::{TagDriver, TagInfo};
use crate::error::{NfcError, Result};
use crate::key::Key;
use crate::medium::{BLOCK_SIZE, Block, BlockAddress};

// last ATR byte of a MIFARE Classic 1K card
pub const ATR_MIFARE_1K: u8 = 0x6a;

// Key slot in the reader's volatile memory
const KEY_SLOT: u8 = 0x00;

const SW_SUCCESS: [u8; 2] = [0x90, 0x00];

fn split_status(resp: &[u8]) -> Option<&[u8]> {
    if resp.len() >= 2 && resp[resp.len() - 2..] == SW_SUCCESS {
        Some(&resp[..resp.len() - 2])
    } else {
        None
    }
}

pub struct PcscDriver {
    card: Card,
}

impl PcscDriver {
    pub fn new(card: Card) -> Self {
        PcscDriver { card }
    }

    fn transmit(&self, apdu: &[u8]) -> Result<Vec<u8>> {
        let mut recv_buffer = [0u8; 256];
        let resp = self.card.transmit(apdu, &mut recv_buffer)?;
        Ok(resp.to_vec())
    }

    // Load Authentication Keys into Reader Memory: FF 82 00 slot 06 [KEY]
    fn load_key(&self, key: &Key) -> Result<()> {
        let mut apdu = vec![0xFF, 0x82, 0x00, KEY_SLOT, 0x06];
        apdu.extend_from_slice(key.bytes());
        let resp = self.transmit(&apdu)?;
        split_status(&resp)
            .map(|_| ())
            .ok_or_else(|| NfcError::Reader(format!("Load Key Failed: {:02X?}", resp)))
    }

    fn atr_last_byte(&self) -> Result<u8> {
        let mut names_buf = [0u8; 128];
        let mut atr_buf = [0u8; 64];
        let status = self.card.status2(&mut names_buf, &mut atr_buf)?;
        status
            .atr()
            .last()
            .copied()
            .ok_or_else(|| NfcError::Reader("Empty ATR".into()))
    }
}

impl TagDriver for PcscDriver {
    fn select_tag(&mut self) -> Result<TagInfo> {
        // Get Data (UID): FF CA 00 00 00
        let resp = self.transmit(&[0xFF, 0xCA, 0x00, 0x00, 0x00])?;
        let uid = split_status(&resp).ok_or(NfcError::NoTag)?.to_vec();
        let tag_type = self.atr_last_byte()?;
        Ok(TagInfo { uid, tag_type })
    }

    // General Authenticate: FF 86 00 00 05 01 00 Block KeyType KeySlot
    // The reader already knows the selected UID.
    fn authenticate(&mut self, key: &Key, addr: BlockAddress, _uid: &[u8]) -> Result<()> {
        self.load_key(key)?;
        let apdu = [
            0xFF,
            0x86,
            0x00,
            0x00,
            0x05,
            0x01,
            0x00,
            addr.value(),
            key.mode() as u8,
            KEY_SLOT,
        ];
        let resp = self.transmit(&apdu)?;
        split_status(&resp)
            .map(|_| ())
            .ok_or(NfcError::AuthFailure { block: addr.value() })
    }

    // Read Binary: FF B0 00 Block Len
    fn read_block(&mut self, addr: BlockAddress) -> Result<Block> {
        let apdu = [0xFF, 0xB0, 0x00, addr.value(), BLOCK_SIZE as u8];
        let resp = self.transmit(&apdu).map_err(|e| NfcError::ReadFailure {
            block: addr.value(),
            reason: e.to_string(),
        })?;
        let data = split_status(&resp).ok_or_else(|| NfcError::ReadFailure {
            block: addr.value(),
            reason: format!("status {:02X?}", resp),
        })?;
        data.try_into().map_err(|_| NfcError::ReadFailure {
            block: addr.value(),
            reason: format!("invalid data length: {}", data.len()),
        })
    }

    // Update Binary: FF D6 00 Block Len [Data]
    fn write_block(&mut self, addr: BlockAddress, data: &Block) -> Result<()> {
        let mut apdu = vec![0xFF, 0xD6, 0x00, addr.value(), BLOCK_SIZE as u8];
        apdu.extend_from_slice(data);
        let resp = self.transmit(&apdu).map_err(|e| NfcError::WriteFailure {
            block: addr.value(),
            reason: e.to_string(),
        })?;
        split_status(&resp)
            .map(|_| ())
            .ok_or_else(|| NfcError::WriteFailure {
                block: addr.value(),
                reason: format!("status {:02X?}", resp),
            })
    }

    fn deselect(&mut self) {
        // The card handle is released when the driver is dropped
        debug!("Tag session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_word_is_stripped() {
        assert_eq!(split_status(&[0x01, 0x02, 0x90, 0x00]), Some(&[0x01, 0x02][..]));
        assert_eq!(split_status(&[0x90, 0x00]), Some(&[][..]));
        assert_eq!(split_status(&[0x63, 0x00]), None);
        assert_eq!(split_status(&[0x90]), None);
    }
}
