use sdvolume::{BlockDevice, Volume, BLOCK_SIZE};

use super::{next_in_chain, FileHandle, FileType};
use crate::error::FsError;
use crate::fs::FatFs;

/// A saved cursor, restorable without walking the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilePos {
    pub position: u32,
    cluster: u32,
}

impl FileHandle {
    pub fn position(&self) -> u32 {
        self.cur_position
    }

    /// Bytes between the cursor and end of file.
    pub fn available(&self) -> u32 {
        if self.is_file() {
            self.file_size.saturating_sub(self.cur_position)
        } else {
            0
        }
    }

    pub fn rewind(&mut self) {
        self.reset_cursor();
    }

    pub fn get_pos(&self) -> FilePos {
        FilePos {
            position: self.cur_position,
            cluster: self.cur_cluster,
        }
    }

    /// Restores a cursor from `get_pos`. A position past the current end
    /// of file (the file was truncated since) is rejected.
    pub fn set_pos(&mut self, pos: FilePos) -> Result<(), FsError> {
        if !self.is_open() {
            return Err(FsError::NotOpen);
        }
        if pos.position > self.file_size {
            return Err(FsError::SeekOutOfRange);
        }
        self.cur_position = pos.position;
        self.cur_cluster = pos.cluster;
        Ok(())
    }

    pub fn seek_set<D: BlockDevice>(&mut self, fs: &mut FatFs<D>, pos: u32) -> Result<(), FsError> {
        self.seek_to(&mut fs.volume, pos)
    }

    pub fn seek_cur<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        offset: i32,
    ) -> Result<(), FsError> {
        let target = relative(self.cur_position, offset)?;
        self.seek_to(&mut fs.volume, target)
    }

    pub fn seek_end<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        offset: i32,
    ) -> Result<(), FsError> {
        let target = relative(self.file_size, offset)?;
        self.seek_to(&mut fs.volume, target)
    }

    pub(crate) fn seek_to<D: BlockDevice>(
        &mut self,
        vol: &mut Volume<D>,
        pos: u32,
    ) -> Result<(), FsError> {
        if !self.is_open() {
            return Err(FsError::NotOpen);
        }
        if pos > self.file_size {
            return Err(FsError::SeekOutOfRange);
        }
        if self.kind == FileType::RootFixed {
            self.cur_position = pos;
            return Ok(());
        }
        if pos == 0 {
            self.reset_cursor();
            return Ok(());
        }

        // The cursor cluster is the one holding byte `pos - 1`.
        let shift = vol.cluster_size_shift() as u32 + BLOCK_SIZE.trailing_zeros();
        let target = (pos - 1) >> shift;
        let saved = self.cur_cluster;
        let hops = if self.cur_position == 0 || self.cur_cluster == 0 {
            self.cur_cluster = self.first_cluster;
            target
        } else {
            let current = (self.cur_position - 1) >> shift;
            if target < current {
                self.cur_cluster = self.first_cluster;
                target
            } else {
                target - current
            }
        };
        for _ in 0..hops {
            match next_in_chain(vol, self.cur_cluster) {
                Ok(next) => self.cur_cluster = next,
                Err(err) => {
                    self.cur_cluster = saved;
                    return Err(err);
                }
            }
        }
        self.cur_position = pos;
        Ok(())
    }
}

fn relative(base: u32, offset: i32) -> Result<u32, FsError> {
    u32::try_from(base as i64 + offset as i64).map_err(|_| FsError::SeekOutOfRange)
}
