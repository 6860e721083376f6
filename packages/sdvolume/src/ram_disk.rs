use crate::block::{Block, BlockDevice, BurstCursor, DeviceError, BLOCK_SIZE};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IoStats {
    pub block_reads: u32,
    pub block_writes: u32,
    pub burst_reads: u32,
    pub burst_writes: u32,
    pub burst_blocks_read: u32,
    pub burst_blocks_written: u32,
}

/// Memory-backed block device. Any trailing partial block is ignored.
pub struct RamDisk<B> {
    buf: B,
    burst: BurstCursor,
    stats: IoStats,
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> RamDisk<B> {
    pub fn new(buf: B) -> Self {
        Self {
            buf,
            burst: BurstCursor::new(),
            stats: IoStats::default(),
        }
    }

    pub fn stats(&self) -> IoStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = IoStats::default();
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_ref()
    }

    pub fn into_inner(self) -> B {
        self.buf
    }

    fn span(&self, lba: u32) -> Result<core::ops::Range<usize>, DeviceError> {
        if lba >= self.block_count() {
            return Err(DeviceError::OutOfRange(lba));
        }
        let start = lba as usize * BLOCK_SIZE;
        Ok(start..start + BLOCK_SIZE)
    }

    fn copy_out(&self, lba: u32, out: &mut Block) -> Result<(), DeviceError> {
        let span = self.span(lba)?;
        out.copy_from_slice(&self.buf.as_ref()[span]);
        Ok(())
    }

    fn copy_in(&mut self, lba: u32, data: &Block) -> Result<(), DeviceError> {
        let span = self.span(lba)?;
        self.buf.as_mut()[span].copy_from_slice(data);
        Ok(())
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> BlockDevice for RamDisk<B> {
    fn block_count(&self) -> u32 {
        (self.buf.as_ref().len() / BLOCK_SIZE) as u32
    }

    fn read_block(&mut self, lba: u32, out: &mut Block) -> Result<(), DeviceError> {
        self.copy_out(lba, out)?;
        self.stats.block_reads += 1;
        Ok(())
    }

    fn write_block(&mut self, lba: u32, data: &Block) -> Result<(), DeviceError> {
        self.copy_in(lba, data)?;
        self.stats.block_writes += 1;
        Ok(())
    }

    fn read_start(&mut self, lba: u32) -> Result<(), DeviceError> {
        self.span(lba)?;
        self.burst.begin_read(lba)?;
        self.stats.burst_reads += 1;
        Ok(())
    }

    fn read_data(&mut self, out: &mut Block) -> Result<(), DeviceError> {
        let lba = self.burst.next_read()?;
        self.copy_out(lba, out)?;
        self.stats.burst_blocks_read += 1;
        Ok(())
    }

    fn read_stop(&mut self) -> Result<(), DeviceError> {
        self.burst.end_read()
    }

    fn write_start(&mut self, lba: u32, count: u32) -> Result<(), DeviceError> {
        self.span(lba)?;
        self.burst.begin_write(lba, count)?;
        self.stats.burst_writes += 1;
        Ok(())
    }

    fn write_data(&mut self, data: &Block) -> Result<(), DeviceError> {
        let lba = self.burst.next_write()?;
        self.copy_in(lba, data)?;
        self.stats.burst_blocks_written += 1;
        Ok(())
    }

    fn write_stop(&mut self) -> Result<(), DeviceError> {
        self.burst.end_write()
    }
}
