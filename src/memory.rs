// src/memory.rs
//! In-memory MIFARE Classic 1K card.
//!
//! Keys live where a real card keeps them: key A in bytes 0..6 and key B in
//! bytes 10..16 of each sector trailer. Authentication is a plain comparison
//! against those bytes, and only unlocks the sector that was authenticated.

use std::collections::HashSet;

use crate::driver::{TagDriver, TagInfo};
use crate::error::{NfcError, Result};
use crate::key::{Key, KeyMode};
use crate::medium::{BLOCK_COUNT, BLOCK_SIZE, BLOCKS_PER_SECTOR, Block, BlockAddress, SECTOR_COUNT};

// access bits + GPB of a transport trailer
const TRANSPORT_ACCESS: [u8; 4] = [0xFF, 0x07, 0x80, 0x69];

pub const MIFARE_1K_TYPE: u8 = 0x08;

#[derive(Debug, Clone)]
pub struct MemoryCard {
    uid: [u8; 4],
    blocks: [Block; BLOCK_COUNT as usize],
    present: bool,
    authenticated: Option<u8>,
    read_faults: HashSet<u8>,
    write_faults: HashSet<u8>,
    reads: usize,
    writes: usize,
}

impl MemoryCard {
    pub fn new(uid: [u8; 4]) -> Self {
        let mut blocks = [[0u8; BLOCK_SIZE]; BLOCK_COUNT as usize];
        blocks[0][..4].copy_from_slice(&uid);
        blocks[0][4] = uid.iter().fold(0, |acc, b| acc ^ b);
        blocks[0][5] = MIFARE_1K_TYPE;

        let mut card = MemoryCard {
            uid,
            blocks,
            present: true,
            authenticated: None,
            read_faults: HashSet::new(),
            write_faults: HashSet::new(),
            reads: 0,
            writes: 0,
        };
        for sector in 0..SECTOR_COUNT {
            card.set_sector_keys(sector, Key::DEFAULT, Key::DEFAULT_B);
        }
        card
    }

    pub fn set_sector_keys(&mut self, sector: u8, key_a: Key, key_b: Key) {
        let trailer = &mut self.blocks[(sector * BLOCKS_PER_SECTOR + BLOCKS_PER_SECTOR - 1) as usize];
        trailer[..6].copy_from_slice(key_a.bytes());
        trailer[6..10].copy_from_slice(&TRANSPORT_ACCESS);
        trailer[10..].copy_from_slice(key_b.bytes());
    }

    pub fn remove(&mut self) {
        self.present = false;
        self.authenticated = None;
    }

    pub fn fail_reads_at(&mut self, addr: u8) {
        self.read_faults.insert(addr);
    }

    pub fn fail_writes_at(&mut self, addr: u8) {
        self.write_faults.insert(addr);
    }

    pub fn block(&self, addr: u8) -> &Block {
        &self.blocks[addr as usize]
    }

    pub fn set_block(&mut self, addr: u8, data: Block) {
        self.blocks[addr as usize] = data;
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    fn check_authenticated(&self, addr: BlockAddress) -> bool {
        self.present && self.authenticated == Some(addr.sector())
    }
}

impl Default for MemoryCard {
    fn default() -> Self {
        MemoryCard::new([0xDE, 0xAD, 0xBE, 0xEF])
    }
}

impl TagDriver for MemoryCard {
    fn select_tag(&mut self) -> Result<TagInfo> {
        if !self.present {
            return Err(NfcError::NoTag);
        }
        self.authenticated = None;
        Ok(TagInfo {
            uid: self.uid.to_vec(),
            tag_type: MIFARE_1K_TYPE,
        })
    }

    fn authenticate(&mut self, key: &Key, addr: BlockAddress, uid: &[u8]) -> Result<()> {
        self.authenticated = None;
        if !self.present || uid != self.uid.as_slice() {
            return Err(NfcError::AuthFailure { block: addr.value() });
        }
        let trailer = &self.blocks[addr.trailer().value() as usize];
        let stored = match key.mode() {
            KeyMode::A => &trailer[..6],
            KeyMode::B => &trailer[10..],
        };
        if stored != key.bytes().as_slice() {
            return Err(NfcError::AuthFailure { block: addr.value() });
        }
        self.authenticated = Some(addr.sector());
        Ok(())
    }

    fn read_block(&mut self, addr: BlockAddress) -> Result<Block> {
        if !self.check_authenticated(addr) {
            return Err(NfcError::ReadFailure {
                block: addr.value(),
                reason: "sector not authenticated".into(),
            });
        }
        if self.read_faults.contains(&addr.value()) {
            return Err(NfcError::ReadFailure {
                block: addr.value(),
                reason: "injected fault".into(),
            });
        }
        self.reads += 1;
        Ok(self.blocks[addr.value() as usize])
    }

    fn write_block(&mut self, addr: BlockAddress, data: &Block) -> Result<()> {
        if !self.check_authenticated(addr) {
            return Err(NfcError::WriteFailure {
                block: addr.value(),
                reason: "sector not authenticated".into(),
            });
        }
        if addr.is_manufacturer() {
            return Err(NfcError::WriteFailure {
                block: addr.value(),
                reason: "manufacturer block is read-only".into(),
            });
        }
        if self.write_faults.contains(&addr.value()) {
            return Err(NfcError::WriteFailure {
                block: addr.value(),
                reason: "injected fault".into(),
            });
        }
        self.writes += 1;
        self.blocks[addr.value() as usize] = *data;
        Ok(())
    }

    fn deselect(&mut self) {
        self.authenticated = None;
    }
}
