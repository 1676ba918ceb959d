// src/stream.rs
use log::debug;

use crate::error::{NfcError, Result};
use crate::key::Key;
use crate::medium::{BLOCK_SIZE, Block, BlockAddress, BlockStore};

/// Flat byte view over an ordered list of data blocks.
///
/// Reading pulls one physical block at a time into a 16 byte lookahead
/// buffer, so a parser only touches as many blocks as it consumes. Writing
/// always starts again at the first block of the list.
pub struct BlockStream<'a, S: BlockStore> {
    store: S,
    blocks: &'a [BlockAddress],
    key: Key,
    cursor: usize,
    buffer: Block,
    pos: usize,
    len: usize,
}

impl<'a, S: BlockStore> BlockStream<'a, S> {
    pub fn new(store: S, blocks: &'a [BlockAddress], key: Key) -> Self {
        BlockStream {
            store,
            blocks,
            key,
            cursor: 0,
            buffer: [0; BLOCK_SIZE],
            pos: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.blocks.len() * BLOCK_SIZE
    }

    pub fn blocks_read(&self) -> usize {
        self.cursor
    }

    pub fn next_byte(&mut self) -> Result<u8> {
        if self.pos == self.len {
            let addr = *self.blocks.get(self.cursor).ok_or(NfcError::EndOfMedium)?;
            self.buffer = self.store.read_block(addr, &self.key)?;
            self.cursor += 1;
            self.pos = 0;
            self.len = BLOCK_SIZE;
        }
        let byte = self.buffer[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    pub fn next_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.next_byte()?);
        }
        Ok(out)
    }

    /// Writes `bytes` from the first block on, zero padding the last block.
    /// Fails before touching the medium when the data does not fit.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let required = bytes.len().div_ceil(BLOCK_SIZE);
        if required > self.blocks.len() {
            return Err(NfcError::CapacityExceeded {
                required,
                available: self.blocks.len(),
            });
        }

        for (chunk, &addr) in bytes.chunks(BLOCK_SIZE).zip(self.blocks.iter()) {
            let mut block = [0u8; BLOCK_SIZE];
            block[..chunk.len()].copy_from_slice(chunk);
            self.store.write_block(addr, &block, &self.key)?;
        }
        debug!("Wrote {} bytes over {} blocks", bytes.len(), required);

        // whatever was buffered for reading is stale now
        self.cursor = 0;
        self.pos = 0;
        self.len = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::TagSession;
    use crate::memory::MemoryCard;
    use crate::medium::NDEF_BLOCKS;

    fn card_with(bytes: &[u8]) -> MemoryCard {
        let mut card = MemoryCard::default();
        for (chunk, addr) in bytes.chunks(BLOCK_SIZE).zip(NDEF_BLOCKS.iter()) {
            let mut block = [0u8; BLOCK_SIZE];
            block[..chunk.len()].copy_from_slice(chunk);
            card.set_block(addr.value(), block);
        }
        card
    }

    #[test]
    fn reads_across_block_boundaries() {
        let data: Vec<u8> = (0..40).collect();
        let mut card = card_with(&data);
        let session = TagSession::open(&mut card).unwrap();
        let mut stream = BlockStream::new(session, &NDEF_BLOCKS, Key::DEFAULT);

        assert_eq!(stream.next_byte().unwrap(), 0);
        assert_eq!(stream.blocks_read(), 1);
        assert_eq!(stream.next_bytes(20).unwrap(), (1..21).collect::<Vec<u8>>());
        assert_eq!(stream.blocks_read(), 2);
    }

    #[test]
    fn trailers_are_skipped() {
        let data: Vec<u8> = (0..50).collect();
        let mut card = card_with(&data);
        let session = TagSession::open(&mut card).unwrap();
        let mut stream = BlockStream::new(session, &NDEF_BLOCKS, Key::DEFAULT);

        // blocks 4, 5, 6 then 8; trailer 7 never shows up in the stream
        assert_eq!(stream.next_bytes(48).unwrap(), &data[..48]);
        assert_eq!(stream.blocks_read(), 3);
        assert_eq!(stream.next_bytes(2).unwrap(), vec![48, 49]);
        assert_eq!(stream.blocks_read(), 4);
    }

    #[test]
    fn end_of_medium() {
        let blocks = [BlockAddress::new(4).unwrap()];
        let mut card = MemoryCard::default();
        let session = TagSession::open(&mut card).unwrap();
        let mut stream = BlockStream::new(session, &blocks, Key::DEFAULT);

        assert_eq!(stream.next_bytes(16).unwrap().len(), 16);
        assert_eq!(stream.next_byte(), Err(NfcError::EndOfMedium));
        assert_eq!(stream.next_bytes(2), Err(NfcError::EndOfMedium));
    }

    #[test]
    fn read_errors_surface_unchanged() {
        let mut card = MemoryCard::default();
        card.set_sector_keys(1, Key::NDEF, Key::DEFAULT_B);
        let session = TagSession::open(&mut card).unwrap();
        let mut stream = BlockStream::new(session, &NDEF_BLOCKS, Key::DEFAULT);
        assert_eq!(stream.next_byte(), Err(NfcError::AuthFailure { block: 4 }));
    }

    #[test]
    fn write_pads_final_block() {
        let mut card = MemoryCard::default();
        {
            let session = TagSession::open(&mut card).unwrap();
            let mut stream = BlockStream::new(session, &NDEF_BLOCKS, Key::DEFAULT);
            stream.write_all(&[0xAB; 20]).unwrap();
        }
        assert_eq!(card.block(4), &[0xAB; 16]);
        assert_eq!(&card.block(5)[..4], &[0xAB; 4]);
        assert_eq!(&card.block(5)[4..], &[0u8; 12]);
        assert_eq!(card.writes(), 2);
    }

    #[test]
    fn write_rejects_oversized_data_without_writing() {
        let mut card = MemoryCard::default();
        {
            let session = TagSession::open(&mut card).unwrap();
            let mut stream = BlockStream::new(session, &NDEF_BLOCKS, Key::DEFAULT);
            let too_big = vec![1u8; stream.capacity() + 1];
            assert_eq!(
                stream.write_all(&too_big),
                Err(NfcError::CapacityExceeded { required: 46, available: 45 })
            );
        }
        assert_eq!(card.writes(), 0);
    }
}
