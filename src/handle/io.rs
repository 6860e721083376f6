use sdvolume::{Block, BlockDevice, CacheMode, Volume, BLOCK_SIZE};

use super::{next_in_chain, FileHandle, FileType};
use crate::config::{BURST_MIN_BYTES, MULTI_BLOCK_IO};
use crate::error::FsError;
use crate::flags::OpenFlags;
use crate::fs::FatFs;
use crate::sink::ByteSink;

const BLOCK_MASK: u32 = BLOCK_SIZE as u32 - 1;
const STREAM_CHUNK: usize = 64;

impl FileHandle {
    /// Block under the cursor, stepping to the next cluster when the cursor
    /// sits on a cluster boundary.
    pub(crate) fn block_for_read<D: BlockDevice>(
        &mut self,
        vol: &mut Volume<D>,
    ) -> Result<u32, FsError> {
        if self.kind == FileType::RootFixed {
            return Ok(vol.root_dir_start() + (self.cur_position >> 9));
        }
        let block_of_cluster = vol.block_of_cluster(self.cur_position);
        if self.cur_position & BLOCK_MASK == 0 && block_of_cluster == 0 {
            self.cur_cluster = if self.cur_position == 0 {
                self.first_cluster
            } else {
                next_in_chain(vol, self.cur_cluster)?
            };
        }
        Ok(vol.cluster_start_block(self.cur_cluster) + block_of_cluster as u32)
    }

    /// Reads up to `buf.len()` bytes from the cursor, clamped to end of file.
    pub fn read<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        buf: &mut [u8],
    ) -> Result<usize, FsError> {
        if !self.is_open() {
            return Err(FsError::NotOpen);
        }
        if !self.flags.contains(OpenFlags::READ) {
            return Err(FsError::WriteOnly);
        }
        let vol = &mut fs.volume;
        let len = buf.len().min(self.file_size.saturating_sub(self.cur_position) as usize);
        let blocks_per_cluster = vol.blocks_per_cluster() as u32;

        let mut done = 0;
        while done < len {
            let remaining = len - done;
            let offset = (self.cur_position & BLOCK_MASK) as usize;
            let block_of_cluster = vol.block_of_cluster(self.cur_position) as u32;
            let block = self.block_for_read(vol)?;
            let dst = &mut buf[done..len];

            let n = if offset != 0
                || remaining < BLOCK_SIZE
                || vol.cache_block_number() == Some(block)
            {
                let n = remaining.min(BLOCK_SIZE - offset);
                let cached = vol.cache_fetch(block, CacheMode::Read)?;
                dst[..n].copy_from_slice(&cached[offset..offset + n]);
                n
            } else if !MULTI_BLOCK_IO || remaining < BURST_MIN_BYTES {
                vol.read_block(block, block_mut(dst)?)?;
                BLOCK_SIZE
            } else {
                let mut count = (remaining / BLOCK_SIZE) as u32;
                if self.kind != FileType::RootFixed {
                    count = count.min(blocks_per_cluster - block_of_cluster);
                }
                if let Some(cached) = vol.cache_block_number() {
                    if (block..block + count).contains(&cached) {
                        vol.cache_sync()?;
                    }
                }
                vol.read_start(block)?;
                for chunk in dst.chunks_exact_mut(BLOCK_SIZE).take(count as usize) {
                    vol.read_data(block_mut(chunk)?)?;
                }
                vol.read_stop()?;
                count as usize * BLOCK_SIZE
            };
            self.cur_position += n as u32;
            done += n;
        }
        Ok(len)
    }

    pub fn read_byte<D: BlockDevice>(&mut self, fs: &mut FatFs<D>) -> Result<Option<u8>, FsError> {
        let mut byte = [0u8; 1];
        Ok(match self.read(fs, &mut byte)? {
            0 => None,
            _ => Some(byte[0]),
        })
    }

    /// The next byte without consuming it.
    pub fn peek<D: BlockDevice>(&mut self, fs: &mut FatFs<D>) -> Result<Option<u8>, FsError> {
        let pos = self.get_pos();
        let byte = self.read_byte(fs)?;
        self.set_pos(pos)?;
        Ok(byte)
    }

    /// Reads one line into `buf`, dropping `\r`. Stops after the first
    /// delimiter byte (`\n` when `delimiters` is `None`), at end of file, or
    /// when `buf` is full. Returns the number of bytes stored.
    pub fn read_line<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        buf: &mut [u8],
        delimiters: Option<&[u8]>,
    ) -> Result<usize, FsError> {
        let delimiters = delimiters.unwrap_or(b"\n");
        let mut stored = 0;
        while stored < buf.len() {
            let Some(byte) = self.read_byte(fs)? else {
                break;
            };
            if byte == b'\r' {
                continue;
            }
            buf[stored] = byte;
            stored += 1;
            if delimiters.contains(&byte) {
                break;
            }
        }
        Ok(stored)
    }

    /// Copies everything from the cursor to end of file into `sink`.
    /// Stops early if the sink accepts fewer bytes than offered.
    pub fn stream_to<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        sink: &mut impl ByteSink,
    ) -> Result<u32, FsError> {
        let mut chunk = [0u8; STREAM_CHUNK];
        let mut total = 0u32;
        loop {
            let n = self.read(fs, &mut chunk)?;
            if n == 0 {
                return Ok(total);
            }
            let accepted = sink.write_bytes(&chunk[..n]);
            total += accepted as u32;
            if accepted < n {
                return Ok(total);
            }
        }
    }

    /// Writes `src` at the cursor, allocating clusters as needed.
    ///
    /// On failure the sticky write error is set and the file size still
    /// covers every byte that reached the medium.
    pub fn write<D: BlockDevice>(&mut self, fs: &mut FatFs<D>, src: &[u8]) -> Result<usize, FsError> {
        match self.write_blocks(fs, src) {
            Ok(()) => {
                if self.flags.contains(OpenFlags::SYNC) {
                    self.sync(fs)?;
                }
                Ok(src.len())
            }
            Err(err) => {
                self.write_error = true;
                if self.cur_position > self.file_size {
                    self.file_size = self.cur_position;
                    self.dir_dirty = true;
                }
                Err(err)
            }
        }
    }

    pub fn write_byte<D: BlockDevice>(&mut self, fs: &mut FatFs<D>, byte: u8) -> Result<(), FsError> {
        self.write(fs, &[byte]).map(|_| ())
    }

    fn write_blocks<D: BlockDevice>(&mut self, fs: &mut FatFs<D>, src: &[u8]) -> Result<(), FsError> {
        match self.kind {
            FileType::Closed => return Err(FsError::NotOpen),
            FileType::Normal => {}
            _ => return Err(FsError::NotAFile),
        }
        if !self.flags.contains(OpenFlags::WRITE) {
            return Err(FsError::ReadOnly);
        }
        if self.flags.contains(OpenFlags::APPEND) && self.cur_position != self.file_size {
            self.seek_to(&mut fs.volume, self.file_size)?;
        }

        let vol = &mut fs.volume;
        let blocks_per_cluster = vol.blocks_per_cluster() as u32;
        let mut done = 0;
        while done < src.len() {
            let remaining = src.len() - done;
            let offset = (self.cur_position & BLOCK_MASK) as usize;
            let block_of_cluster = vol.block_of_cluster(self.cur_position) as u32;
            if offset == 0 && block_of_cluster == 0 {
                if self.cur_cluster != 0 {
                    let next = vol.fat_get(self.cur_cluster)?;
                    if vol.is_eoc(next) {
                        self.add_cluster(vol)?;
                    } else {
                        self.cur_cluster = next;
                    }
                } else if self.first_cluster == 0 {
                    self.add_cluster(vol)?;
                } else {
                    self.cur_cluster = self.first_cluster;
                }
            }
            let block = vol.cluster_start_block(self.cur_cluster) + block_of_cluster;
            let data = &src[done..];

            let n = if offset != 0 || remaining < BLOCK_SIZE {
                let n = remaining.min(BLOCK_SIZE - offset);
                let mode = if offset == 0 && self.cur_position >= self.file_size {
                    CacheMode::ReserveForWrite
                } else {
                    CacheMode::Write
                };
                let cached = vol.cache_fetch(block, mode)?;
                cached[offset..offset + n].copy_from_slice(&data[..n]);
                if offset + n == BLOCK_SIZE {
                    vol.cache_write_data()?;
                }
                n
            } else if !MULTI_BLOCK_IO || remaining < BURST_MIN_BYTES {
                if vol.cache_block_number() == Some(block) {
                    vol.cache_invalidate();
                }
                vol.write_block(block, block_ref(data)?)?;
                BLOCK_SIZE
            } else {
                let count =
                    ((remaining / BLOCK_SIZE) as u32).min(blocks_per_cluster - block_of_cluster);
                vol.write_start(block, count)?;
                for (i, chunk) in data.chunks_exact(BLOCK_SIZE).take(count as usize).enumerate() {
                    if vol.cache_block_number() == Some(block + i as u32) {
                        vol.cache_invalidate();
                    }
                    vol.write_data(block_ref(chunk)?)?;
                }
                vol.write_stop()?;
                count as usize * BLOCK_SIZE
            };
            self.cur_position += n as u32;
            done += n;
        }

        if self.cur_position > self.file_size {
            self.file_size = self.cur_position;
            self.dir_dirty = true;
        } else if fs.clock.is_some() && !src.is_empty() {
            self.dir_dirty = true;
        }
        Ok(())
    }
}

fn block_mut(buf: &mut [u8]) -> Result<&mut Block, FsError> {
    buf.first_chunk_mut::<BLOCK_SIZE>()
        .ok_or(FsError::BufferTooSmall { needed: BLOCK_SIZE })
}

fn block_ref(buf: &[u8]) -> Result<&Block, FsError> {
    buf.first_chunk::<BLOCK_SIZE>()
        .ok_or(FsError::BufferTooSmall { needed: BLOCK_SIZE })
}
