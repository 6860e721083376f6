use heapless::String;
use sdvolume::{BlockDevice, CacheMode, FatType, Volume, BLOCK_SIZE};

use crate::config::MAX_DIR_BLOCKS;
use crate::error::FsError;
use crate::flags::{OpenFlags, TimestampKind};
use crate::fs::FatFs;
use crate::record::{DirRecord, RecordSlot, DIR_RECORD_SIZE};
use crate::time::FatTimestamp;

mod alloc;
mod dir;
mod io;
mod mutate;
mod open;
mod seek;

#[cfg(test)]
mod tests;

pub use seek::FilePos;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
    Closed,
    Normal,
    Subdir,
    /// FAT16 root: a fixed run of blocks outside the cluster heap.
    RootFixed,
    /// FAT32 root: an ordinary cluster chain with no parent record.
    Root32,
}

/// An open file, directory or volume root.
///
/// A handle holds only cursor and metadata state. Every operation borrows
/// the [`FatFs`] it was opened on, so handles are plain values that can be
/// copied and kept in static storage. Two handles on the same record do not
/// see each other's changes; a deleted record is detected at the next sync.
#[derive(Clone, Copy, Debug)]
pub struct FileHandle {
    kind: FileType,
    flags: OpenFlags,
    dir_dirty: bool,
    write_error: bool,
    first_cluster: u32,
    file_size: u32,
    cur_cluster: u32,
    cur_position: u32,
    slot: Option<RecordSlot>,
}

impl Default for FileHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl FileHandle {
    pub const fn new() -> Self {
        Self {
            kind: FileType::Closed,
            flags: OpenFlags::empty(),
            dir_dirty: false,
            write_error: false,
            first_cluster: 0,
            file_size: 0,
            cur_cluster: 0,
            cur_position: 0,
            slot: None,
        }
    }

    pub fn file_type(&self) -> FileType {
        self.kind
    }

    pub fn is_open(&self) -> bool {
        self.kind != FileType::Closed
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileType::Normal
    }

    pub fn is_subdir(&self) -> bool {
        self.kind == FileType::Subdir
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, FileType::RootFixed | FileType::Root32)
    }

    pub fn is_dir(&self) -> bool {
        self.is_subdir() || self.is_root()
    }

    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    pub fn file_size(&self) -> u32 {
        self.file_size
    }

    pub fn first_cluster(&self) -> u32 {
        self.first_cluster
    }

    pub fn record_slot(&self) -> Option<RecordSlot> {
        self.slot
    }

    /// Set when a write or sync failed; stays set until cleared.
    pub fn write_error(&self) -> bool {
        self.write_error
    }

    pub fn clear_write_error(&mut self) {
        self.write_error = false;
    }

    pub fn open_root<D: BlockDevice>(&mut self, fs: &mut FatFs<D>) -> Result<(), FsError> {
        self.open_root_in(&mut fs.volume)
    }

    pub(crate) fn open_root_in<D: BlockDevice>(
        &mut self,
        vol: &mut Volume<D>,
    ) -> Result<(), FsError> {
        if self.is_open() {
            return Err(FsError::AlreadyOpen);
        }
        match vol.fat_type() {
            FatType::Fat16 => {
                self.kind = FileType::RootFixed;
                self.first_cluster = 0;
                self.file_size = DIR_RECORD_SIZE as u32 * vol.root_dir_entry_count() as u32;
            }
            FatType::Fat32 => {
                self.kind = FileType::Root32;
                self.first_cluster = vol.root_dir_start();
                if let Err(err) = self.set_dir_size(vol) {
                    self.kind = FileType::Closed;
                    return Err(err);
                }
            }
        }
        self.flags = OpenFlags::READ;
        self.slot = None;
        self.reset_cursor();
        self.dir_dirty = false;
        self.write_error = false;
        Ok(())
    }

    /// Writes pending record metadata and flushes the block cache.
    pub fn sync<D: BlockDevice>(&mut self, fs: &mut FatFs<D>) -> Result<(), FsError> {
        let result = self.sync_record(fs);
        if result.is_err() {
            self.write_error = true;
        }
        result
    }

    fn sync_record<D: BlockDevice>(&mut self, fs: &mut FatFs<D>) -> Result<(), FsError> {
        if !self.is_open() {
            return Err(FsError::NotOpen);
        }
        if self.dir_dirty {
            if let Some(slot) = self.slot {
                let now = fs.clock.map(|clock| clock());
                let block = fs.volume.cache_fetch(slot.block, CacheMode::Write)?;
                let mut record = DirRecord::read_from(block, slot.index as usize);
                if record.is_deleted() {
                    log::warn!(
                        "sdfat: sync_stale block={} index={}",
                        slot.block,
                        slot.index
                    );
                    return Err(FsError::Stale);
                }
                if !self.is_dir() {
                    record.file_size = self.file_size;
                }
                record.set_first_cluster(self.first_cluster);
                if let Some(now) = now {
                    record.last_write_date = now.date;
                    record.last_write_time = now.time;
                    record.last_access_date = now.date;
                }
                record.write_to(block, slot.index as usize);
            }
            self.dir_dirty = false;
        }
        fs.volume.cache_sync()?;
        Ok(())
    }

    pub fn close<D: BlockDevice>(&mut self, fs: &mut FatFs<D>) -> Result<(), FsError> {
        let result = self.sync(fs);
        self.kind = FileType::Closed;
        result
    }

    /// A synced copy of the backing record.
    pub fn dir_entry<D: BlockDevice>(&mut self, fs: &mut FatFs<D>) -> Result<DirRecord, FsError> {
        self.sync(fs)?;
        self.load_record(&mut fs.volume)
    }

    /// Display name; the root is `/`.
    pub fn name<D: BlockDevice>(&self, fs: &mut FatFs<D>) -> Result<String<12>, FsError> {
        if !self.is_open() {
            return Err(FsError::NotOpen);
        }
        if self.is_root() {
            let mut root = String::new();
            let _ = root.push('/');
            return Ok(root);
        }
        Ok(self.load_record(&mut fs.volume)?.short_name().decode())
    }

    /// Sets the selected timestamps of the backing record.
    #[allow(clippy::too_many_arguments)]
    pub fn timestamp<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        which: TimestampKind,
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<(), FsError> {
        let stamp = FatTimestamp::new(year, month, day, hour, minute, second)?;
        if !self.is_open() {
            return Err(FsError::NotOpen);
        }
        self.sync(fs)?;
        self.update_record(&mut fs.volume, |record| {
            if which.contains(TimestampKind::ACCESS) {
                record.last_access_date = stamp.date;
            }
            if which.contains(TimestampKind::CREATE) {
                record.creation_date = stamp.date;
                record.creation_time = stamp.time;
                record.creation_time_tenths = if second & 1 == 1 { 100 } else { 0 };
            }
            if which.contains(TimestampKind::WRITE) {
                record.last_write_date = stamp.date;
                record.last_write_time = stamp.time;
            }
        })?;
        fs.volume.cache_sync()?;
        Ok(())
    }

    /// Copies every timestamp of `source`'s record onto this one.
    pub fn copy_timestamps_from<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        source: &mut FileHandle,
    ) -> Result<(), FsError> {
        let from = source.dir_entry(fs)?;
        self.sync(fs)?;
        self.update_record(&mut fs.volume, |record| {
            record.last_access_date = from.last_access_date;
            record.creation_date = from.creation_date;
            record.creation_time = from.creation_time;
            record.creation_time_tenths = from.creation_time_tenths;
            record.last_write_date = from.last_write_date;
            record.last_write_time = from.last_write_time;
        })?;
        fs.volume.cache_sync()?;
        Ok(())
    }

    pub(crate) fn reset_cursor(&mut self) {
        self.cur_cluster = 0;
        self.cur_position = 0;
    }

    /// Sizes a cluster-backed directory from the length of its chain.
    pub(crate) fn set_dir_size<D: BlockDevice>(
        &mut self,
        vol: &mut Volume<D>,
    ) -> Result<(), FsError> {
        let mut blocks = 0u32;
        let mut cluster = self.first_cluster;
        loop {
            blocks += vol.blocks_per_cluster() as u32;
            if blocks >= MAX_DIR_BLOCKS {
                return Err(FsError::DirectoryFull);
            }
            cluster = vol.fat_get(cluster)?;
            if vol.is_eoc(cluster) {
                break;
            }
        }
        self.file_size = blocks * BLOCK_SIZE as u32;
        Ok(())
    }

    pub(crate) fn load_record<D: BlockDevice>(
        &self,
        vol: &mut Volume<D>,
    ) -> Result<DirRecord, FsError> {
        let slot = self.slot.ok_or(FsError::NotFound)?;
        let block = vol.cache_fetch(slot.block, CacheMode::Read)?;
        Ok(DirRecord::read_from(block, slot.index as usize))
    }

    pub(crate) fn update_record<D: BlockDevice>(
        &self,
        vol: &mut Volume<D>,
        edit: impl FnOnce(&mut DirRecord),
    ) -> Result<DirRecord, FsError> {
        let slot = self.slot.ok_or(FsError::NotFound)?;
        let block = vol.cache_fetch(slot.block, CacheMode::Write)?;
        let mut record = DirRecord::read_from(block, slot.index as usize);
        edit(&mut record);
        record.write_to(block, slot.index as usize);
        Ok(record)
    }
}

/// Follows one link of a chain that must continue.
pub(crate) fn next_in_chain<D: BlockDevice>(
    vol: &mut Volume<D>,
    cluster: u32,
) -> Result<u32, FsError> {
    let next = vol.fat_get(cluster)?;
    if next < 2 || vol.is_eoc(next) {
        return Err(FsError::Volume(sdvolume::VolumeError::BadCluster(next)));
    }
    Ok(next)
}
