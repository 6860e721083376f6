use core::fmt;

use sdvolume::BlockDevice;

use crate::fs::FatFs;
use crate::handle::FileHandle;

/// Anything that accepts bytes. Returns how many were taken.
pub trait ByteSink {
    fn write_bytes(&mut self, bytes: &[u8]) -> usize;
}

impl<const N: usize> ByteSink for heapless::Vec<u8, N> {
    fn write_bytes(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.capacity() - self.len());
        let _ = self.extend_from_slice(&bytes[..n]);
        n
    }
}

/// A file opened for writing, usable as a [`ByteSink`] or with `write!`.
///
/// Errors are not returned per call; they land in the handle's sticky
/// write-error flag.
pub struct FileWriter<'a, D> {
    fs: &'a mut FatFs<D>,
    file: &'a mut FileHandle,
}

impl<'a, D: BlockDevice> FileWriter<'a, D> {
    pub fn new(fs: &'a mut FatFs<D>, file: &'a mut FileHandle) -> Self {
        Self { fs, file }
    }

    pub fn write_error(&self) -> bool {
        self.file.write_error()
    }
}

impl<D: BlockDevice> ByteSink for FileWriter<'_, D> {
    fn write_bytes(&mut self, bytes: &[u8]) -> usize {
        self.file.write(&mut *self.fs, bytes).unwrap_or(0)
    }
}

impl<D: BlockDevice> fmt::Write for FileWriter<'_, D> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.write_bytes(s.as_bytes()) == s.len() {
            Ok(())
        } else {
            Err(fmt::Error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heapless_sink_takes_what_fits() {
        let mut sink: heapless::Vec<u8, 4> = heapless::Vec::new();
        assert_eq!(sink.write_bytes(b"abc"), 3);
        assert_eq!(sink.write_bytes(b"def"), 1);
        assert_eq!(sink.as_slice(), b"abcd");
    }
}
