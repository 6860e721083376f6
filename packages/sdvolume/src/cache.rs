use crate::block::{Block, BLOCK_SIZE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheMode {
    /// Load the block if it is not already cached.
    Read,
    /// Load the block and mark it dirty.
    Write,
    /// Claim the slot for a block that will be fully overwritten; the
    /// buffer is zero-filled instead of read.
    ReserveForWrite,
}

/// The one-block write-back cache shared by every handle on a volume.
pub(crate) struct BlockCache {
    pub(crate) data: Block,
    pub(crate) lba: Option<u32>,
    pub(crate) dirty: bool,
    /// Set when the cached block is a FAT block that must be copied to the
    /// other FATs on flush.
    pub(crate) mirror_fat: bool,
}

impl BlockCache {
    pub(crate) const fn new() -> Self {
        Self {
            data: [0; BLOCK_SIZE],
            lba: None,
            dirty: false,
            mirror_fat: false,
        }
    }

    pub(crate) fn holds(&self, lba: u32) -> bool {
        self.lba == Some(lba)
    }

    pub(crate) fn invalidate(&mut self) {
        self.lba = None;
        self.dirty = false;
        self.mirror_fat = false;
    }
}
