// src/tag.rs
use std::fmt;

use log::{debug, info, warn};

use crate::error::{NfcError, Result};
use crate::hexdump;
use crate::key::Key;
use crate::medium::{BLOCK_SIZE, Block, BlockAddress, BlockStore, DATA_BLOCKS, NDEF_BLOCKS};
use crate::message::Message;
use crate::stream::BlockStream;
use crate::tlv::{self, TlvEntry};

// MIFARE Application Directory: CRC, info byte, then the NDEF application
// id (03 E1) for every sector
const MAD_BLOCK_1: Block = [
    0x14, 0x01, 0x03, 0xE1, 0x03, 0xE1, 0x03, 0xE1, 0x03, 0xE1, 0x03, 0xE1, 0x03, 0xE1, 0x03, 0xE1,
];
const MAD_BLOCK_2: Block = [
    0x03, 0xE1, 0x03, 0xE1, 0x03, 0xE1, 0x03, 0xE1, 0x03, 0xE1, 0x03, 0xE1, 0x03, 0xE1, 0x03, 0xE1,
];

const EMPTY_NDEF: [u8; 3] = [tlv::TLV_NDEF, 0x00, tlv::TLV_TERMINATOR];

pub fn read_tag_entries<S: BlockStore>(store: S, key: Key) -> Result<Vec<TlvEntry>> {
    let mut stream = BlockStream::new(store, &NDEF_BLOCKS, key);
    let entries = tlv::read_entries(&mut stream)?;
    debug!("Read {} TLV entries from {} blocks", entries.len(), stream.blocks_read());
    Ok(entries)
}

pub fn read_tag_messages<S: BlockStore>(store: S, key: Key) -> Result<Vec<Message>> {
    let messages: Vec<Message> = read_tag_entries(store, key)?
        .into_iter()
        .filter_map(|entry| match entry {
            TlvEntry::Ndef(message) => Some(message),
            _ => None,
        })
        .collect();
    info!("Read {} NDEF messages", messages.len());
    Ok(messages)
}

pub fn write_tag_entries<S: BlockStore>(store: S, entries: &[TlvEntry], key: Key) -> Result<()> {
    let mut stream = BlockStream::new(store, &NDEF_BLOCKS, key);
    tlv::write_entries(&mut stream, entries)
}

pub fn write_tag_messages<S: BlockStore>(store: S, messages: &[Message], key: Key) -> Result<()> {
    let entries: Vec<TlvEntry> = messages.iter().cloned().map(TlvEntry::Ndef).collect();
    write_tag_entries(store, &entries, key)?;
    info!("Wrote {} NDEF messages", messages.len());
    Ok(())
}

pub fn format_mad<S: BlockStore>(mut store: S, key: Key) -> Result<()> {
    store.write_block(BlockAddress::new(0x01)?, &MAD_BLOCK_1, &key)?;
    store.write_block(BlockAddress::new(0x02)?, &MAD_BLOCK_2, &key)?;
    info!("Formatted MAD");
    Ok(())
}

/// Leaves a single empty NDEF message and zeroes the rest of the area.
pub fn clean<S: BlockStore>(store: S, key: Key) -> Result<()> {
    let mut stream = BlockStream::new(store, &NDEF_BLOCKS, key);
    let mut area = vec![0u8; stream.capacity()];
    area[..EMPTY_NDEF.len()].copy_from_slice(&EMPTY_NDEF);
    stream.write_all(&area)
}

pub fn clear_data<S: BlockStore>(store: S, key: Key) -> Result<()> {
    let mut stream = BlockStream::new(store, &DATA_BLOCKS, key);
    let zeros = vec![0u8; stream.capacity()];
    stream.write_all(&zeros)
}

#[derive(Debug, Default)]
pub struct BlockDump {
    pub blocks: Vec<(BlockAddress, Block)>,
    pub error: Option<NfcError>,
}

impl fmt::Display for BlockDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (addr, data) in &self.blocks {
            writeln!(f, "{}", hexdump::format_block(*addr, data, "<<"))?;
        }
        if let Some(err) = &self.error {
            writeln!(f, "[!<] {}", err)?;
        }
        Ok(())
    }
}

pub fn read_blocks<S: BlockStore>(mut store: S, addrs: &[BlockAddress], key: Key) -> BlockDump {
    let mut dump = BlockDump::default();
    for &addr in addrs {
        match store.read_block(addr, &key) {
            Ok(data) => dump.blocks.push((addr, data)),
            Err(err) => {
                warn!("[!<] {}: Reading failed! ({})", addr, err);
                dump.error = Some(err);
                break;
            }
        }
    }
    dump
}

pub fn override_block<S: BlockStore>(
    mut store: S,
    addr: BlockAddress,
    data: &[u8],
    pos: usize,
    key: Key,
) -> Result<()> {
    if !addr.is_data() {
        return Err(NfcError::NotDataBlock(addr.value()));
    }
    let Some(end) = pos.checked_add(data.len()).filter(|&end| end <= BLOCK_SIZE) else {
        return Err(NfcError::CapacityExceeded {
            required: pos.saturating_add(data.len()).div_ceil(BLOCK_SIZE),
            available: 1,
        });
    };
    let mut block = store.read_block(addr, &key)?;
    block[pos..end].copy_from_slice(data);
    store.write_block(addr, &block, &key)
}

pub fn discover_key<S: BlockStore>(mut store: S, addr: BlockAddress, candidates: &[Key]) -> Result<Key> {
    for key in candidates {
        match store.read_block(addr, key) {
            Ok(_) => {
                debug!("Block {} opens with {:?}", addr, key);
                return Ok(*key);
            }
            Err(NfcError::AuthFailure { .. }) => continue,
            Err(err) => return Err(err),
        }
    }
    Err(NfcError::AuthFailure { block: addr.value() })
}
