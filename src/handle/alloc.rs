use sdvolume::{BlockDevice, CacheMode, Volume, VolumeError, BLOCK_SIZE};

use super::{FileHandle, FileType};
use crate::config::MAX_DIR_RECORDS;
use crate::error::FsError;
use crate::flags::OpenFlags;
use crate::fs::FatFs;
use crate::record::DIR_RECORD_SIZE;

const ZERO_BLOCK: [u8; BLOCK_SIZE] = [0; BLOCK_SIZE];

impl FileHandle {
    /// Appends one cluster after the cursor cluster, or starts the chain.
    pub(crate) fn add_cluster<D: BlockDevice>(&mut self, vol: &mut Volume<D>) -> Result<(), FsError> {
        let link_after = (self.cur_cluster != 0).then_some(self.cur_cluster);
        self.cur_cluster = vol.alloc_contiguous(1, link_after)?;
        if self.first_cluster == 0 {
            self.first_cluster = self.cur_cluster;
            self.dir_dirty = true;
        }
        Ok(())
    }

    /// Grows a directory by one zero-filled cluster and returns its first
    /// block, which is left in the cache.
    pub(crate) fn add_dir_cluster<D: BlockDevice>(
        &mut self,
        vol: &mut Volume<D>,
    ) -> Result<u32, FsError> {
        if self.file_size / DIR_RECORD_SIZE as u32 >= MAX_DIR_RECORDS {
            return Err(FsError::DirectoryFull);
        }
        let tail = self.cur_cluster;
        self.add_cluster(vol)?;
        let block = vol.cluster_start_block(self.cur_cluster);
        // The cursor still sits at the old end, which belongs to `tail`.
        self.cur_cluster = tail;

        vol.cache_fetch(block, CacheMode::ReserveForWrite)?.fill(0);
        for i in 1..vol.blocks_per_cluster() as u32 {
            vol.write_block(block + i, &ZERO_BLOCK)?;
        }
        self.file_size += vol.bytes_per_cluster();
        Ok(block)
    }

    /// Shrinks the file to `length` bytes, releasing clusters past the new end.
    pub fn truncate<D: BlockDevice>(&mut self, fs: &mut FatFs<D>, length: u32) -> Result<(), FsError> {
        match self.kind {
            FileType::Closed => return Err(FsError::NotOpen),
            FileType::Normal => {}
            _ => return Err(FsError::NotAFile),
        }
        if !self.flags.contains(OpenFlags::WRITE) {
            return Err(FsError::ReadOnly);
        }
        if length > self.file_size {
            return Err(FsError::SeekOutOfRange);
        }
        if self.file_size == 0 {
            return Ok(());
        }

        let new_position = self.cur_position.min(length);
        let vol = &mut fs.volume;
        self.seek_to(vol, length)?;
        if length == 0 {
            vol.free_chain(self.first_cluster)?;
            self.first_cluster = 0;
        } else {
            let next = vol.fat_get(self.cur_cluster)?;
            if !vol.is_eoc(next) {
                vol.fat_put_eoc(self.cur_cluster)?;
                vol.free_chain(next)?;
            }
        }
        log::debug!(
            "sdfat: truncate_ok from={} to={}",
            self.file_size,
            length
        );
        self.file_size = length;
        self.dir_dirty = true;

        self.sync(fs)?;
        self.seek_to(&mut fs.volume, new_position)
    }

    /// First and last block of the file when its clusters form one run.
    pub fn contiguous_range<D: BlockDevice>(
        &self,
        fs: &mut FatFs<D>,
    ) -> Result<Option<(u32, u32)>, FsError> {
        if !self.is_open() {
            return Err(FsError::NotOpen);
        }
        if self.first_cluster == 0 {
            return Ok(None);
        }
        let vol = &mut fs.volume;
        let mut cluster = self.first_cluster;
        loop {
            let next = vol.fat_get(cluster)?;
            if next != cluster + 1 {
                if !vol.is_eoc(next) {
                    return Ok(None);
                }
                let first = vol.cluster_start_block(self.first_cluster);
                let last = vol.cluster_start_block(cluster) + vol.blocks_per_cluster() as u32 - 1;
                return Ok(Some((first, last)));
            }
            cluster = next;
        }
    }

    /// Creates a new file of `size` bytes backed by one contiguous run of
    /// clusters. The contents are whatever the clusters held before.
    pub fn create_contiguous<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        dir: &mut FileHandle,
        path: &str,
        size: u32,
    ) -> Result<(), FsError> {
        if size == 0 {
            return Err(FsError::Volume(VolumeError::InvalidArgument));
        }
        self.open_path(fs, dir, path, OpenFlags::CREAT | OpenFlags::EXCL | OpenFlags::RDWR)?;

        let vol = &mut fs.volume;
        let shift = vol.cluster_size_shift() as u32 + BLOCK_SIZE.trailing_zeros();
        let count = ((size - 1) >> shift) + 1;
        self.first_cluster = match vol.alloc_contiguous(count, None) {
            Ok(cluster) => cluster,
            Err(err) => {
                self.remove(fs)?;
                return Err(err.into());
            }
        };
        self.file_size = size;
        self.dir_dirty = true;
        self.sync(fs)
    }
}
