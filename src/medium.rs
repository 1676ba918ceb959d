// src/medium.rs
use std::fmt;

use lazy_static::lazy_static;

use crate::error::{NfcError, Result};
use crate::key::Key;

pub const BLOCK_SIZE: usize = 16;
pub const BLOCK_COUNT: u8 = 64;
pub const SECTOR_COUNT: u8 = 16;
pub const BLOCKS_PER_SECTOR: u8 = 4;

pub type Block = [u8; BLOCK_SIZE];

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockAddress(u8);

impl BlockAddress {
    pub fn new(addr: u8) -> Result<Self> {
        if addr >= BLOCK_COUNT {
            return Err(NfcError::InvalidBlock(addr));
        }
        Ok(BlockAddress(addr))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn sector(self) -> u8 {
        self.0 / BLOCKS_PER_SECTOR
    }

    // Last block of every sector holds the keys and access bits
    pub fn is_trailer(self) -> bool {
        self.0 % BLOCKS_PER_SECTOR == BLOCKS_PER_SECTOR - 1
    }

    pub fn is_manufacturer(self) -> bool {
        self.0 == 0
    }

    pub fn is_data(self) -> bool {
        !self.is_trailer() && !self.is_manufacturer()
    }

    pub fn trailer(self) -> BlockAddress {
        BlockAddress(self.sector() * BLOCKS_PER_SECTOR + BLOCKS_PER_SECTOR - 1)
    }
}

impl fmt::Debug for BlockAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

impl fmt::Display for BlockAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

lazy_static! {
    pub static ref DATA_BLOCKS: Vec<BlockAddress> = (0..BLOCK_COUNT)
        .map(BlockAddress)
        .filter(|b| b.is_data())
        .collect();

    /// Blocks of sectors 1..15, where the NDEF TLV area lives. Sector 0 keeps
    /// the MIFARE Application Directory.
    pub static ref NDEF_BLOCKS: Vec<BlockAddress> = DATA_BLOCKS
        .iter()
        .copied()
        .filter(|b| b.sector() != 0)
        .collect();
}

/// A sector-authenticated storage medium.
///
/// Every call authenticates `addr` with `key` before touching it; nothing is
/// remembered between calls because neighbouring sectors may use other keys.
pub trait BlockStore {
    fn read_block(&mut self, addr: BlockAddress, key: &Key) -> Result<Block>;

    fn write_block(&mut self, addr: BlockAddress, data: &Block, key: &Key) -> Result<()>;
}

impl<S: BlockStore + ?Sized> BlockStore for &mut S {
    fn read_block(&mut self, addr: BlockAddress, key: &Key) -> Result<Block> {
        (**self).read_block(addr, key)
    }

    fn write_block(&mut self, addr: BlockAddress, data: &Block, key: &Key) -> Result<()> {
        (**self).write_block(addr, data, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_block_layout() {
        assert_eq!(DATA_BLOCKS.len(), 47);
        assert_eq!(NDEF_BLOCKS.len(), 45);
        assert_eq!(DATA_BLOCKS[0].value(), 0x01);
        assert_eq!(DATA_BLOCKS[2].value(), 0x04);
        assert_eq!(NDEF_BLOCKS[0].value(), 0x04);
        assert_eq!(NDEF_BLOCKS.last().map(|b| b.value()), Some(0x3E));
        assert!(DATA_BLOCKS.iter().all(|b| !b.is_trailer()));
    }

    #[test]
    fn address_helpers() {
        let addr = BlockAddress::new(0x09).unwrap();
        assert_eq!(addr.sector(), 2);
        assert_eq!(addr.trailer().value(), 0x0B);
        assert!(addr.is_data());
        assert!(BlockAddress::new(0x0B).unwrap().is_trailer());
        assert!(!BlockAddress::new(0).unwrap().is_data());
        assert_eq!(BlockAddress::new(64), Err(NfcError::InvalidBlock(64)));
    }
}
