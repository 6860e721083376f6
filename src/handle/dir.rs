use sdvolume::{BlockDevice, CacheMode, Volume};

use super::{FileHandle, FileType};
use crate::error::FsError;
use crate::fs::FatFs;
use crate::record::{DirRecord, RecordSlot, DIR_RECORD_SIZE, RECORDS_PER_BLOCK};

impl FileHandle {
    /// Reads the record under the cursor and steps past it. `None` once the
    /// cursor reaches the end of the directory.
    pub(crate) fn read_dir_record<D: BlockDevice>(
        &mut self,
        vol: &mut Volume<D>,
    ) -> Result<Option<(DirRecord, RecordSlot)>, FsError> {
        if !self.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if self.cur_position >= self.file_size {
            return Ok(None);
        }
        let index = (self.cur_position as usize / DIR_RECORD_SIZE) % RECORDS_PER_BLOCK;
        let block = self.block_for_read(vol)?;
        let data = vol.cache_fetch(block, CacheMode::Read)?;
        let record = DirRecord::read_from(data, index);
        self.cur_position += DIR_RECORD_SIZE as u32;
        Ok(Some((
            record,
            RecordSlot {
                block,
                index: index as u8,
            },
        )))
    }

    /// Next live file or subdirectory record. `None` at the end of the
    /// directory.
    pub fn read_dir<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
    ) -> Result<Option<DirRecord>, FsError> {
        if self.cur_position % DIR_RECORD_SIZE as u32 != 0 {
            return Err(FsError::SeekOutOfRange);
        }
        while let Some((record, _)) = self.read_dir_record(&mut fs.volume)? {
            if record.is_free() {
                return Ok(None);
            }
            if record.is_live() {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Rewinds a directory for a full scan, re-measuring its chain so that
    /// clusters appended through another handle are visible.
    pub(crate) fn rescan<D: BlockDevice>(&mut self, vol: &mut Volume<D>) -> Result<(), FsError> {
        if matches!(self.kind, FileType::Subdir | FileType::Root32) {
            self.set_dir_size(vol)?;
        }
        self.reset_cursor();
        Ok(())
    }
}
