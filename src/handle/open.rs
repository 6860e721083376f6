use sdvolume::{BlockDevice, CacheMode};

use super::{FileHandle, FileType};
use crate::config::{DEFAULT_DATE, DEFAULT_TIME};
use crate::error::FsError;
use crate::flags::{Attributes, OpenFlags};
use crate::fs::FatFs;
use crate::name::ShortName;
use crate::path;
use crate::record::{DirRecord, RecordSlot, DIR_RECORD_SIZE};
use crate::time::FatTimestamp;

impl FileHandle {
    /// Opens `path` relative to `dir`, or to the root when it starts with `/`.
    pub fn open_path<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        dir: &mut FileHandle,
        path: &str,
        flags: OpenFlags,
    ) -> Result<(), FsError> {
        if self.is_open() {
            return Err(FsError::AlreadyOpen);
        }
        flags.validate()?;
        require_dir(dir)?;
        let mut resolved = path::resolve(fs, dir, path, false)?;
        let leaf = resolved.leaf;
        let parent = resolved.parent(dir);
        self.open_name(fs, parent, &leaf, flags)
    }

    /// Opens or creates `name` directly inside `dir`.
    ///
    /// The scan remembers the first free or deleted slot; a new record goes
    /// there, or into a freshly appended directory cluster.
    pub(crate) fn open_name<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        dir: &mut FileHandle,
        name: &ShortName,
        flags: OpenFlags,
    ) -> Result<(), FsError> {
        if self.is_open() {
            return Err(FsError::AlreadyOpen);
        }
        flags.validate()?;
        require_dir(dir)?;

        let vol = &mut fs.volume;
        dir.rescan(vol)?;
        let mut free_slot = None;
        let mut found = None;
        while let Some((record, slot)) = dir.read_dir_record(vol)? {
            if record.is_free() || record.is_deleted() {
                free_slot.get_or_insert(slot);
                if record.is_free() {
                    break;
                }
            } else if record.name == *name.as_bytes() && record.attributes.is_file_or_subdir() {
                found = Some(slot);
                break;
            }
        }

        let slot = match found {
            Some(_) if flags.contains(OpenFlags::EXCL) => return Err(FsError::AlreadyExists),
            Some(slot) => slot,
            None => {
                if !flags.contains(OpenFlags::CREAT | OpenFlags::WRITE) {
                    return Err(FsError::NotFound);
                }
                let slot = match free_slot {
                    Some(slot) => slot,
                    None if dir.kind == FileType::RootFixed => return Err(FsError::DirectoryFull),
                    None => RecordSlot {
                        block: dir.add_dir_cluster(vol)?,
                        index: 0,
                    },
                };
                let now = fs.clock.map(|clock| clock()).unwrap_or(FatTimestamp {
                    date: DEFAULT_DATE,
                    time: DEFAULT_TIME,
                });
                let mut record = DirRecord::new(*name);
                record.creation_date = now.date;
                record.creation_time = now.time;
                record.last_access_date = now.date;
                record.last_write_date = now.date;
                record.last_write_time = now.time;

                let vol = &mut fs.volume;
                let block = vol.cache_fetch(slot.block, CacheMode::Write)?;
                record.write_to(block, slot.index as usize);
                vol.cache_sync()?;
                slot
            }
        };
        self.open_slot(fs, slot, flags)
    }

    /// Opens the record at `slot`, applying the truncate and at-end modes.
    pub(crate) fn open_slot<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        slot: RecordSlot,
        flags: OpenFlags,
    ) -> Result<(), FsError> {
        let vol = &mut fs.volume;
        let record = {
            let block = vol.cache_fetch(slot.block, CacheMode::Read)?;
            DirRecord::read_from(block, slot.index as usize)
        };
        if flags.intersects(OpenFlags::WRITE | OpenFlags::TRUNC) {
            if record.attributes.contains(Attributes::DIRECTORY) {
                return Err(FsError::NotAFile);
            }
            if record.attributes.contains(Attributes::READ_ONLY) {
                return Err(FsError::ReadOnly);
            }
        }

        self.first_cluster = record.first_cluster();
        if record.is_file() {
            self.file_size = record.file_size;
            self.kind = FileType::Normal;
        } else if record.is_subdir() {
            self.kind = FileType::Subdir;
            if let Err(err) = self.set_dir_size(vol) {
                self.kind = FileType::Closed;
                return Err(err);
            }
        } else {
            return Err(FsError::NotAFile);
        }
        self.slot = Some(slot);
        self.flags = flags & OpenFlags::RETAINED;
        self.reset_cursor();
        self.dir_dirty = false;
        self.write_error = false;

        let mut result = Ok(());
        if flags.contains(OpenFlags::TRUNC) {
            result = self.truncate(fs, 0);
        }
        if result.is_ok() && flags.contains(OpenFlags::AT_END) {
            result = self.seek_end(fs, 0);
        }
        if result.is_err() {
            self.kind = FileType::Closed;
        }
        result
    }

    /// Opens the record at position `index` of `dir`.
    pub fn open_index<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        dir: &mut FileHandle,
        index: u16,
        flags: OpenFlags,
    ) -> Result<(), FsError> {
        if self.is_open() {
            return Err(FsError::AlreadyOpen);
        }
        if flags.contains(OpenFlags::EXCL) {
            return Err(FsError::InvalidFlags);
        }
        require_dir(dir)?;
        let vol = &mut fs.volume;
        dir.seek_to(vol, index as u32 * DIR_RECORD_SIZE as u32)?;
        let Some((record, slot)) = dir.read_dir_record(vol)? else {
            return Err(FsError::NotFound);
        };
        if record.is_free() || record.is_deleted() || record.is_dot() {
            return Err(FsError::NotFound);
        }
        self.open_slot(fs, slot, flags)
    }

    /// Opens the next file or subdirectory after the cursor of `dir`.
    /// Returns `false` at the end of the directory.
    pub fn open_next<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        dir: &mut FileHandle,
        flags: OpenFlags,
    ) -> Result<bool, FsError> {
        if self.is_open() {
            return Err(FsError::AlreadyOpen);
        }
        require_dir(dir)?;
        if dir.cur_position % DIR_RECORD_SIZE as u32 != 0 {
            return Err(FsError::SeekOutOfRange);
        }
        while let Some((record, slot)) = dir.read_dir_record(&mut fs.volume)? {
            if record.is_free() {
                return Ok(false);
            }
            if record.is_live() {
                self.open_slot(fs, slot, flags)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Opens the directory containing subdirectory `dir`.
    pub fn open_parent<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        dir: &mut FileHandle,
    ) -> Result<(), FsError> {
        if self.is_open() {
            return Err(FsError::AlreadyOpen);
        }
        if !dir.is_subdir() {
            return Err(FsError::NotADirectory);
        }
        let vol = &mut fs.volume;
        dir.seek_to(vol, DIR_RECORD_SIZE as u32)?;
        let dotdot = match dir.read_dir_record(vol)? {
            Some((record, _)) if record.short_name() == ShortName::DOTDOT => record,
            _ => return Err(FsError::NotFound),
        };
        let parent_cluster = dotdot.first_cluster();
        if parent_cluster == 0 {
            return self.open_root(fs);
        }

        // The parent's own `..` leads to the grandparent, which holds the
        // parent's record.
        let block = vol.cluster_start_block(parent_cluster);
        let grand = DirRecord::read_from(vol.cache_fetch(block, CacheMode::Read)?, 1);
        if grand.short_name() != ShortName::DOTDOT {
            return Err(FsError::NotFound);
        }
        let mut grandparent = FileHandle::new();
        if grand.first_cluster() == 0 {
            grandparent.open_root(fs)?;
        } else {
            grandparent.open_slot(fs, RecordSlot { block, index: 1 }, OpenFlags::READ)?;
        }
        loop {
            match grandparent.read_dir(fs)? {
                Some(record) if record.first_cluster() == parent_cluster => break,
                Some(_) => {}
                None => return Err(FsError::NotFound),
            }
        }
        let index = grandparent.cur_position / DIR_RECORD_SIZE as u32 - 1;
        self.open_index(fs, &mut grandparent, index as u16, OpenFlags::READ)
    }
}

fn require_dir(dir: &FileHandle) -> Result<(), FsError> {
    if !dir.is_open() {
        return Err(FsError::NotOpen);
    }
    if !dir.is_dir() {
        return Err(FsError::NotADirectory);
    }
    Ok(())
}
