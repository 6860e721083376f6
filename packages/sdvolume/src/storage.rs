use core::fmt::Debug;

use embedded_storage::Storage;

use crate::block::{Block, BlockDevice, BurstCursor, DeviceError, BLOCK_SIZE};

/// Exposes any `embedded_storage::Storage` (flash partition, PSRAM window)
/// as a block device. Block `n` maps to byte offset `n * 512`.
pub struct StorageDevice<S> {
    storage: S,
    burst: BurstCursor,
}

impl<S> StorageDevice<S>
where
    S: Storage,
    S::Error: Debug,
{
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            burst: BurstCursor::new(),
        }
    }

    pub fn into_inner(self) -> S {
        self.storage
    }

    fn offset(&self, lba: u32) -> Result<u32, DeviceError> {
        if lba >= self.block_count() {
            return Err(DeviceError::OutOfRange(lba));
        }
        lba.checked_mul(BLOCK_SIZE as u32)
            .ok_or(DeviceError::OutOfRange(lba))
    }
}

impl<S> BlockDevice for StorageDevice<S>
where
    S: Storage,
    S::Error: Debug,
{
    fn block_count(&self) -> u32 {
        (self.storage.capacity() / BLOCK_SIZE) as u32
    }

    fn read_block(&mut self, lba: u32, out: &mut Block) -> Result<(), DeviceError> {
        let offset = self.offset(lba)?;
        self.storage.read(offset, out).map_err(|err| {
            log::warn!("sdvol: storage_read_failed lba={} err={:?}", lba, err);
            DeviceError::Transfer
        })
    }

    fn write_block(&mut self, lba: u32, data: &Block) -> Result<(), DeviceError> {
        let offset = self.offset(lba)?;
        self.storage.write(offset, data).map_err(|err| {
            log::warn!("sdvol: storage_write_failed lba={} err={:?}", lba, err);
            DeviceError::Transfer
        })
    }

    fn read_start(&mut self, lba: u32) -> Result<(), DeviceError> {
        self.offset(lba)?;
        self.burst.begin_read(lba)
    }

    fn read_data(&mut self, out: &mut Block) -> Result<(), DeviceError> {
        let lba = self.burst.next_read()?;
        self.read_block(lba, out)
    }

    fn read_stop(&mut self) -> Result<(), DeviceError> {
        self.burst.end_read()
    }

    fn write_start(&mut self, lba: u32, count: u32) -> Result<(), DeviceError> {
        self.offset(lba)?;
        self.burst.begin_write(lba, count)
    }

    fn write_data(&mut self, data: &Block) -> Result<(), DeviceError> {
        let lba = self.burst.next_write()?;
        self.write_block(lba, data)
    }

    fn write_stop(&mut self) -> Result<(), DeviceError> {
        self.burst.end_write()
    }
}
