use sdvolume::{BlockDevice, CacheMode, Volume};

use super::{FileHandle, FileType};
use crate::error::FsError;
use crate::flags::{Attributes, OpenFlags};
use crate::fs::FatFs;
use crate::name::ShortName;
use crate::path;
use crate::record::{DirRecord, RecordSlot, DIR_RECORD_SIZE, NAME_DELETED};

impl FileHandle {
    /// Creates directory `path` relative to `parent` and leaves it open.
    /// With `create_parents`, missing intermediate directories are created.
    pub fn mkdir<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        parent: &mut FileHandle,
        path: &str,
        create_parents: bool,
    ) -> Result<(), FsError> {
        if self.is_open() {
            return Err(FsError::AlreadyOpen);
        }
        if !parent.is_dir() {
            return Err(FsError::NotADirectory);
        }
        let mut resolved = path::resolve(fs, parent, path, create_parents)?;
        let leaf = resolved.leaf;
        let dir = resolved.parent(parent);
        self.mkdir_name(fs, dir, &leaf)
    }

    pub(crate) fn mkdir_name<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        parent: &mut FileHandle,
        name: &ShortName,
    ) -> Result<(), FsError> {
        if !parent.is_dir() {
            return Err(FsError::NotADirectory);
        }
        self.open_name(
            fs,
            parent,
            name,
            OpenFlags::CREAT | OpenFlags::EXCL | OpenFlags::RDWR,
        )?;
        self.flags = OpenFlags::READ;
        self.kind = FileType::Subdir;

        self.add_dir_cluster(&mut fs.volume)?;
        self.sync(fs)?;

        let vol = &mut fs.volume;
        let mut dot = self.update_record(vol, |record| {
            record.attributes = Attributes::DIRECTORY;
        })?;
        dot.name = *ShortName::DOT.as_bytes();
        let mut dotdot = dot;
        dotdot.name = *ShortName::DOTDOT.as_bytes();
        dotdot.set_first_cluster(if parent.is_root() {
            0
        } else {
            parent.first_cluster
        });

        let block = vol.cluster_start_block(self.first_cluster);
        let data = vol.cache_fetch(block, CacheMode::Write)?;
        dot.write_to(data, 0);
        dotdot.write_to(data, 1);
        vol.cache_sync()?;
        log::debug!(
            "sdfat: mkdir_ok name={} cluster={}",
            name,
            self.first_cluster
        );
        Ok(())
    }

    /// Frees the file's clusters, deletes its record and closes the handle.
    pub fn remove<D: BlockDevice>(&mut self, fs: &mut FatFs<D>) -> Result<(), FsError> {
        self.truncate(fs, 0)?;
        let slot = self.slot.ok_or(FsError::NotFound)?;
        set_name_byte(&mut fs.volume, slot, NAME_DELETED)?;
        self.kind = FileType::Closed;
        fs.volume.cache_sync()?;
        log::debug!(
            "sdfat: remove_ok block={} index={}",
            slot.block,
            slot.index
        );
        Ok(())
    }

    /// Removes an empty subdirectory.
    pub fn rmdir<D: BlockDevice>(&mut self, fs: &mut FatFs<D>) -> Result<(), FsError> {
        match self.kind {
            FileType::Closed => return Err(FsError::NotOpen),
            FileType::Subdir => {}
            _ => return Err(FsError::NotADirectory),
        }
        let vol = &mut fs.volume;
        self.rescan(vol)?;
        while let Some((record, _)) = self.read_dir_record(vol)? {
            if record.is_free() {
                break;
            }
            if record.is_deleted() || record.is_dot() {
                continue;
            }
            if record.attributes.is_file_or_subdir() {
                return Err(FsError::DirectoryNotEmpty);
            }
        }
        self.kind = FileType::Normal;
        self.flags |= OpenFlags::WRITE;
        self.remove(fs)
    }

    /// Deletes everything below this directory, depth first, then the
    /// directory itself unless it is the root.
    pub fn rm_rf_star<D: BlockDevice>(&mut self, fs: &mut FatFs<D>) -> Result<(), FsError> {
        if !self.is_dir() {
            return Err(if self.is_open() {
                FsError::NotADirectory
            } else {
                FsError::NotOpen
            });
        }
        self.rescan(&mut fs.volume)?;
        loop {
            let index = self.cur_position / DIR_RECORD_SIZE as u32;
            let Some((record, _)) = self.read_dir_record(&mut fs.volume)? else {
                break;
            };
            if record.is_free() {
                break;
            }
            if !record.is_live() {
                continue;
            }

            let mut child = FileHandle::new();
            child.open_index(fs, self, index as u16, OpenFlags::READ)?;
            if child.is_subdir() {
                child.rm_rf_star(fs)?;
            } else {
                child.flags |= OpenFlags::WRITE;
                child.remove(fs)?;
            }

            let next = (index + 1) * DIR_RECORD_SIZE as u32;
            if self.cur_position != next {
                self.seek_to(&mut fs.volume, next)?;
            }
        }
        if !self.is_root() {
            self.rmdir(fs)?;
        }
        Ok(())
    }

    /// Moves this file or directory to `new_path`, relative to `dir`.
    ///
    /// Not atomic: a failure while creating the destination restores the
    /// source name, but a failure after that point can leave the moved
    /// directory's `..` stale and its replacement cluster unreleased.
    pub fn rename<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        dir: &mut FileHandle,
        new_path: &str,
    ) -> Result<(), FsError> {
        match self.kind {
            FileType::Closed => return Err(FsError::NotOpen),
            FileType::Normal | FileType::Subdir => {}
            _ => return Err(FsError::NotAFile),
        }
        self.sync(fs)?;
        let old_slot = self.slot.ok_or(FsError::NotFound)?;
        let entry = {
            let block = fs.volume.cache_fetch(old_slot.block, CacheMode::Write)?;
            let entry = DirRecord::read_from(block, old_slot.index as usize);
            block[old_slot.index as usize * DIR_RECORD_SIZE] = NAME_DELETED;
            entry
        };

        let mut target = FileHandle::new();
        let created = if self.is_file() {
            target.open_path(
                fs,
                dir,
                new_path,
                OpenFlags::CREAT | OpenFlags::EXCL | OpenFlags::WRITE,
            )
        } else {
            target.mkdir(fs, dir, new_path, false)
        };
        if let Err(err) = created {
            if let Err(restore_err) = set_name_byte(&mut fs.volume, old_slot, entry.name[0])
                .and_then(|()| fs.volume.cache_sync().map_err(FsError::from))
            {
                log::warn!(
                    "sdfat: rename_restore_failed err={:?} restore_err={:?}",
                    err,
                    restore_err
                );
            }
            return Err(err);
        }

        let new_slot = target.slot.ok_or(FsError::NotFound)?;
        let replacement_cluster = if self.is_subdir() {
            target.first_cluster
        } else {
            0
        };
        let vol = &mut fs.volume;
        let block = vol.cache_fetch(new_slot.block, CacheMode::Write)?;
        let mut moved = entry;
        moved.name = DirRecord::read_from(block, new_slot.index as usize).name;
        moved.write_to(block, new_slot.index as usize);
        self.slot = Some(new_slot);

        if replacement_cluster != 0 {
            // mkdir wrote a `..` naming the new parent; move it into the
            // directory's own first cluster and drop the fresh one.
            let fresh = vol.cluster_start_block(replacement_cluster);
            let dotdot = DirRecord::read_from(vol.cache_fetch(fresh, CacheMode::Read)?, 1);
            vol.free_chain(replacement_cluster)?;
            let own = vol.cluster_start_block(self.first_cluster);
            dotdot.write_to(vol.cache_fetch(own, CacheMode::Write)?, 1);
        }
        vol.cache_sync()?;
        log::debug!(
            "sdfat: rename_ok block={} index={}",
            new_slot.block,
            new_slot.index
        );
        Ok(())
    }
}

fn set_name_byte<D: BlockDevice>(
    vol: &mut Volume<D>,
    slot: RecordSlot,
    byte: u8,
) -> Result<(), FsError> {
    let block = vol.cache_fetch(slot.block, CacheMode::Write)?;
    block[slot.index as usize * DIR_RECORD_SIZE] = byte;
    Ok(())
}
