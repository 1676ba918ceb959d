// src/driver.rs
use std::fmt;

use log::{debug, trace, warn};

use crate::error::{NfcError, Result};
use crate::hexdump;
use crate::key::Key;
use crate::medium::{Block, BlockAddress, BlockStore};

#[derive(Clone, PartialEq, Eq)]
pub struct TagInfo {
    pub uid: Vec<u8>,
    pub tag_type: u8,
}

impl fmt::Display for TagInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<NFCTag type=\"0x{:02x}\" uid=\"0x{}\" />",
            self.tag_type,
            hex::encode(&self.uid)
        )
    }
}

impl fmt::Debug for TagInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Low-level contract of the RFID front end. Request/anticollision/select
/// and the authentication cipher all live behind it.
pub trait TagDriver {
    fn select_tag(&mut self) -> Result<TagInfo>;

    fn authenticate(&mut self, key: &Key, addr: BlockAddress, uid: &[u8]) -> Result<()>;

    fn read_block(&mut self, addr: BlockAddress) -> Result<Block>;

    fn write_block(&mut self, addr: BlockAddress, data: &Block) -> Result<()>;

    fn deselect(&mut self);
}

impl<D: TagDriver + ?Sized> TagDriver for &mut D {
    fn select_tag(&mut self) -> Result<TagInfo> {
        (**self).select_tag()
    }

    fn authenticate(&mut self, key: &Key, addr: BlockAddress, uid: &[u8]) -> Result<()> {
        (**self).authenticate(key, addr, uid)
    }

    fn read_block(&mut self, addr: BlockAddress) -> Result<Block> {
        (**self).read_block(addr)
    }

    fn write_block(&mut self, addr: BlockAddress, data: &Block) -> Result<()> {
        (**self).write_block(addr, data)
    }

    fn deselect(&mut self) {
        (**self).deselect()
    }
}

// Deselects the tag when dropped
pub struct TagSession<D: TagDriver> {
    driver: D,
    tag: TagInfo,
}

impl<D: TagDriver> TagSession<D> {
    pub fn open(mut driver: D) -> Result<Self> {
        let tag = driver.select_tag()?;
        debug!("Found tag: {}", tag);
        Ok(TagSession { driver, tag })
    }

    pub fn tag(&self) -> &TagInfo {
        &self.tag
    }

    fn authenticate(&mut self, addr: BlockAddress, key: &Key) -> Result<()> {
        self.driver
            .authenticate(key, addr, &self.tag.uid)
            .inspect_err(|err| warn!("[!!] {}: Authentication failed! ({})", addr, err))
    }
}

impl<D: TagDriver> BlockStore for TagSession<D> {
    fn read_block(&mut self, addr: BlockAddress, key: &Key) -> Result<Block> {
        self.authenticate(addr, key)?;
        let data = self.driver.read_block(addr)?;
        trace!("{}", hexdump::format_block(addr, &data, "<<"));
        Ok(data)
    }

    fn write_block(&mut self, addr: BlockAddress, data: &Block, key: &Key) -> Result<()> {
        self.authenticate(addr, key)?;
        self.driver.write_block(addr, data)?;
        trace!("{}", hexdump::format_block(addr, data, ">>"));
        Ok(())
    }
}

impl<D: TagDriver> Drop for TagSession<D> {
    fn drop(&mut self) {
        self.driver.deselect();
    }
}

impl<D: TagDriver> fmt::Debug for TagSession<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagSession").field("tag", &self.tag).finish()
    }
}

pub fn scan_for_tag<D: TagDriver>(mut driver: D, attempts: usize) -> Result<TagSession<D>> {
    for _ in 0..attempts {
        match driver.select_tag() {
            Ok(tag) => {
                debug!("Found tag: {}", tag);
                return Ok(TagSession { driver, tag });
            }
            Err(NfcError::NoTag) => continue,
            Err(err) => return Err(err),
        }
    }
    Err(NfcError::NoTag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCard;

    #[test]
    fn scan_waits_for_a_tag() {
        let mut card = MemoryCard::default();
        let session = scan_for_tag(&mut card, 3).unwrap();
        assert_eq!(session.tag().uid, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(
            session.tag().to_string(),
            "<NFCTag type=\"0x08\" uid=\"0xdeadbeef\" />"
        );
        drop(session);

        card.remove();
        assert_eq!(scan_for_tag(&mut card, 3).unwrap_err(), NfcError::NoTag);
    }
}
