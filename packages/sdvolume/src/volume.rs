use core::fmt;

use crate::block::{Block, BlockDevice, DeviceError, BLOCK_SIZE};
use crate::cache::{BlockCache, CacheMode};
use crate::mount::{self, Geometry};

const FAT16_EOC: u32 = 0xFFF8;
const FAT16_EOC_WRITE: u32 = 0xFFFF;
const FAT32_EOC: u32 = 0x0FFF_FFF8;
const FAT32_EOC_WRITE: u32 = 0x0FFF_FFFF;
const FAT32_MASK: u32 = 0x0FFF_FFFF;
const FIRST_DATA_CLUSTER: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FatType {
    Fat16,
    Fat32,
}

impl FatType {
    pub const fn entry_size(self) -> u32 {
        match self {
            Self::Fat16 => 2,
            Self::Fat32 => 4,
        }
    }

    const fn entries_per_block_shift(self) -> u32 {
        match self {
            Self::Fat16 => 8,
            Self::Fat32 => 7,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeError {
    Device(DeviceError),
    InvalidBootSector,
    UnsupportedSectorSize(u16),
    UnsupportedSectorsPerCluster(u8),
    UnsupportedFatType,
    BadCluster(u32),
    DiskFull,
    InvalidArgument,
    DeviceTooSmall,
}

impl From<DeviceError> for VolumeError {
    fn from(value: DeviceError) -> Self {
        Self::Device(value)
    }
}

impl fmt::Display for VolumeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(err) => write!(f, "device error: {}", err),
            Self::InvalidBootSector => f.write_str("invalid boot sector"),
            Self::UnsupportedSectorSize(size) => write!(f, "unsupported sector size {}", size),
            Self::UnsupportedSectorsPerCluster(n) => {
                write!(f, "unsupported sectors per cluster {}", n)
            }
            Self::UnsupportedFatType => f.write_str("unsupported FAT type"),
            Self::BadCluster(cluster) => write!(f, "bad cluster {}", cluster),
            Self::DiskFull => f.write_str("no free clusters"),
            Self::InvalidArgument => f.write_str("invalid argument"),
            Self::DeviceTooSmall => f.write_str("device too small"),
        }
    }
}

/// A mounted FAT16/FAT32 volume: FAT table access, cluster allocation and
/// the single-slot block cache. Everything above this layer reaches the
/// device through here.
pub struct Volume<D> {
    device: D,
    geometry: Geometry,
    cache: BlockCache,
    alloc_search_start: u32,
}

impl<D: BlockDevice> Volume<D> {
    pub fn mount(mut device: D) -> Result<Self, VolumeError> {
        let geometry = mount::read_geometry(&mut device)?;
        log::debug!(
            "sdvol: mounted fat={:?} clusters={} blocks_per_cluster={} data_start={}",
            geometry.fat_type,
            geometry.cluster_count,
            geometry.blocks_per_cluster,
            geometry.data_start_block
        );
        Ok(Self {
            device,
            geometry,
            cache: BlockCache::new(),
            alloc_search_start: FIRST_DATA_CLUSTER,
        })
    }

    /// Flushes the cache and hands the device back.
    pub fn unmount(mut self) -> Result<D, VolumeError> {
        self.cache_sync()?;
        Ok(self.device)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn fat_type(&self) -> FatType {
        self.geometry.fat_type
    }

    pub fn blocks_per_cluster(&self) -> u8 {
        self.geometry.blocks_per_cluster
    }

    pub fn cluster_size_shift(&self) -> u8 {
        self.geometry.cluster_size_shift
    }

    pub fn bytes_per_cluster(&self) -> u32 {
        (BLOCK_SIZE as u32) << self.geometry.cluster_size_shift
    }

    pub fn cluster_count(&self) -> u32 {
        self.geometry.cluster_count
    }

    pub fn root_dir_start(&self) -> u32 {
        self.geometry.root_dir_start
    }

    pub fn root_dir_entry_count(&self) -> u16 {
        self.geometry.root_dir_entry_count
    }

    pub fn cluster_start_block(&self, cluster: u32) -> u32 {
        self.geometry.data_start_block
            + (cluster.wrapping_sub(FIRST_DATA_CLUSTER) << self.geometry.cluster_size_shift)
    }

    /// Block index inside its cluster for a byte position.
    pub fn block_of_cluster(&self, position: u32) -> u8 {
        ((position >> 9) & (self.geometry.blocks_per_cluster as u32 - 1)) as u8
    }

    pub fn is_eoc(&self, value: u32) -> bool {
        match self.geometry.fat_type {
            FatType::Fat16 => value >= FAT16_EOC,
            FatType::Fat32 => value >= FAT32_EOC,
        }
    }

    fn check_cluster(&self, cluster: u32) -> Result<(), VolumeError> {
        if cluster < FIRST_DATA_CLUSTER || cluster > self.geometry.cluster_count + 1 {
            return Err(VolumeError::BadCluster(cluster));
        }
        Ok(())
    }

    fn fat_slot(&self, cluster: u32) -> (u32, usize) {
        let fat_type = self.geometry.fat_type;
        let shift = fat_type.entries_per_block_shift();
        let lba = self.geometry.fat_start_block + (cluster >> shift);
        let index = (cluster & ((1 << shift) - 1)) * fat_type.entry_size();
        (lba, index as usize)
    }

    pub fn fat_get(&mut self, cluster: u32) -> Result<u32, VolumeError> {
        self.check_cluster(cluster)?;
        let fat_type = self.geometry.fat_type;
        let (lba, index) = self.fat_slot(cluster);
        let block = self.cache_fetch(lba, CacheMode::Read)?;
        Ok(match fat_type {
            FatType::Fat16 => u16::from_le_bytes([block[index], block[index + 1]]) as u32,
            FatType::Fat32 => {
                u32::from_le_bytes([
                    block[index],
                    block[index + 1],
                    block[index + 2],
                    block[index + 3],
                ]) & FAT32_MASK
            }
        })
    }

    pub fn fat_put(&mut self, cluster: u32, value: u32) -> Result<(), VolumeError> {
        self.check_cluster(cluster)?;
        let fat_type = self.geometry.fat_type;
        let mirror = self.geometry.fat_count > 1;
        let (lba, index) = self.fat_slot(cluster);
        let block = self.cache_fetch(lba, CacheMode::Write)?;
        match fat_type {
            FatType::Fat16 => {
                block[index..index + 2].copy_from_slice(&(value as u16).to_le_bytes());
            }
            FatType::Fat32 => {
                let old = u32::from_le_bytes([
                    block[index],
                    block[index + 1],
                    block[index + 2],
                    block[index + 3],
                ]);
                let merged = (old & !FAT32_MASK) | (value & FAT32_MASK);
                block[index..index + 4].copy_from_slice(&merged.to_le_bytes());
            }
        }
        if mirror {
            self.cache.mirror_fat = true;
        }
        Ok(())
    }

    pub fn fat_put_eoc(&mut self, cluster: u32) -> Result<(), VolumeError> {
        let eoc = match self.geometry.fat_type {
            FatType::Fat16 => FAT16_EOC_WRITE,
            FatType::Fat32 => FAT32_EOC_WRITE,
        };
        self.fat_put(cluster, eoc)
    }

    /// Allocates `count` consecutive free clusters, chains and terminates
    /// them, and links the run after `link_after` when extending a chain.
    /// Returns the first cluster of the run.
    pub fn alloc_contiguous(
        &mut self,
        count: u32,
        link_after: Option<u32>,
    ) -> Result<u32, VolumeError> {
        if count == 0 {
            return Err(VolumeError::InvalidArgument);
        }
        let fat_end = self.geometry.cluster_count + 1;
        let (mut bgn, set_start) = match link_after {
            Some(tail) => (tail + 1, false),
            None => (self.alloc_search_start, count == 1),
        };
        let mut end = bgn;
        let mut visited = 0;
        loop {
            if visited >= self.geometry.cluster_count {
                log::trace!("sdvol: alloc_failed count={} reason=disk_full", count);
                return Err(VolumeError::DiskFull);
            }
            if end > fat_end {
                bgn = FIRST_DATA_CLUSTER;
                end = FIRST_DATA_CLUSTER;
            }
            if self.fat_get(end)? != 0 {
                bgn = end + 1;
            } else if end - bgn + 1 == count {
                break;
            }
            visited += 1;
            end += 1;
        }

        self.fat_put_eoc(end)?;
        while end > bgn {
            self.fat_put(end - 1, end)?;
            end -= 1;
        }
        if let Some(tail) = link_after {
            self.fat_put(tail, bgn)?;
        }
        if set_start {
            self.alloc_search_start = bgn + 1;
        }
        log::trace!("sdvol: alloc_ok first={} count={}", bgn, count);
        Ok(bgn)
    }

    /// Returns every cluster of the chain starting at `cluster` to the free pool.
    pub fn free_chain(&mut self, mut cluster: u32) -> Result<(), VolumeError> {
        loop {
            let next = self.fat_get(cluster)?;
            self.fat_put(cluster, 0)?;
            if cluster < self.alloc_search_start {
                self.alloc_search_start = cluster;
            }
            if self.is_eoc(next) {
                return Ok(());
            }
            cluster = next;
        }
    }

    pub fn free_cluster_count(&mut self) -> Result<u32, VolumeError> {
        let mut free = 0;
        for cluster in FIRST_DATA_CLUSTER..=self.geometry.cluster_count + 1 {
            if self.fat_get(cluster)? == 0 {
                free += 1;
            }
        }
        Ok(free)
    }

    /// Brings `lba` into the cache slot and returns the buffer.
    ///
    /// A dirty block already in the slot is written back first, so the
    /// returned reference is only valid until the next fetch.
    pub fn cache_fetch(&mut self, lba: u32, mode: CacheMode) -> Result<&mut Block, VolumeError> {
        if !self.cache.holds(lba) {
            self.cache_sync()?;
            match mode {
                CacheMode::ReserveForWrite => self.cache.data.fill(0),
                CacheMode::Read | CacheMode::Write => {
                    if let Err(err) = self.device.read_block(lba, &mut self.cache.data) {
                        self.cache.invalidate();
                        return Err(err.into());
                    }
                }
            }
            self.cache.lba = Some(lba);
            self.cache.dirty = false;
            self.cache.mirror_fat = false;
        }
        if mode != CacheMode::Read {
            self.cache.dirty = true;
        }
        Ok(&mut self.cache.data)
    }

    pub fn cache_block_number(&self) -> Option<u32> {
        self.cache.lba
    }

    /// Writes the cached block back, copying FAT blocks to every FAT.
    pub fn cache_sync(&mut self) -> Result<(), VolumeError> {
        if !self.cache.dirty {
            return Ok(());
        }
        let Some(lba) = self.cache.lba else {
            self.cache.dirty = false;
            return Ok(());
        };
        self.device.write_block(lba, &self.cache.data)?;
        if self.cache.mirror_fat {
            for copy in 1..self.geometry.fat_count as u32 {
                let mirror_lba = lba + copy * self.geometry.blocks_per_fat;
                self.device.write_block(mirror_lba, &self.cache.data)?;
            }
            self.cache.mirror_fat = false;
        }
        self.cache.dirty = false;
        Ok(())
    }

    /// Writes back a dirty data block without FAT mirroring.
    pub fn cache_write_data(&mut self) -> Result<(), VolumeError> {
        if self.cache.mirror_fat {
            return self.cache_sync();
        }
        if let (true, Some(lba)) = (self.cache.dirty, self.cache.lba) {
            self.device.write_block(lba, &self.cache.data)?;
            self.cache.dirty = false;
        }
        Ok(())
    }

    /// Drops the cached block without writing it back.
    pub fn cache_invalidate(&mut self) {
        self.cache.invalidate();
    }

    pub fn read_block(&mut self, lba: u32, out: &mut Block) -> Result<(), VolumeError> {
        self.device.read_block(lba, out).map_err(Into::into)
    }

    pub fn write_block(&mut self, lba: u32, data: &Block) -> Result<(), VolumeError> {
        self.device.write_block(lba, data).map_err(Into::into)
    }

    pub fn read_start(&mut self, lba: u32) -> Result<(), VolumeError> {
        self.device.read_start(lba).map_err(Into::into)
    }

    pub fn read_data(&mut self, out: &mut Block) -> Result<(), VolumeError> {
        self.device.read_data(out).map_err(Into::into)
    }

    pub fn read_stop(&mut self) -> Result<(), VolumeError> {
        self.device.read_stop().map_err(Into::into)
    }

    pub fn write_start(&mut self, lba: u32, count: u32) -> Result<(), VolumeError> {
        self.device.write_start(lba, count).map_err(Into::into)
    }

    pub fn write_data(&mut self, data: &Block) -> Result<(), VolumeError> {
        self.device.write_data(data).map_err(Into::into)
    }

    pub fn write_stop(&mut self) -> Result<(), VolumeError> {
        self.device.write_stop().map_err(Into::into)
    }
}
