use sdvolume::{BlockDevice, Volume};

use crate::error::FsError;
use crate::flags::OpenFlags;
use crate::handle::FileHandle;
use crate::time::ClockFn;

/// A mounted volume plus the state path operations resolve against: the
/// current working directory and an optional clock for record timestamps.
pub struct FatFs<D> {
    pub(crate) volume: Volume<D>,
    pub(crate) clock: Option<ClockFn>,
    cwd: FileHandle,
}

impl<D: BlockDevice> FatFs<D> {
    pub fn mount(device: D) -> Result<Self, FsError> {
        let volume = Volume::mount(device)?;
        let mut fs = Self {
            volume,
            clock: None,
            cwd: FileHandle::new(),
        };
        fs.chdir_root()?;
        Ok(fs)
    }

    /// Flushes the block cache and returns the device.
    pub fn unmount(self) -> Result<D, FsError> {
        Ok(self.volume.unmount()?)
    }

    pub fn set_clock(&mut self, clock: Option<ClockFn>) {
        self.clock = clock;
    }

    pub fn volume(&self) -> &Volume<D> {
        &self.volume
    }

    pub fn volume_mut(&mut self) -> &mut Volume<D> {
        &mut self.volume
    }

    pub fn cwd(&self) -> FileHandle {
        self.cwd
    }

    pub fn open_root(&mut self) -> Result<FileHandle, FsError> {
        let mut root = FileHandle::new();
        root.open_root(self)?;
        Ok(root)
    }

    pub fn chdir_root(&mut self) -> Result<(), FsError> {
        self.cwd = self.open_root()?;
        Ok(())
    }

    /// Changes the working directory. `/` or an empty path selects the root.
    pub fn chdir(&mut self, path: &str) -> Result<(), FsError> {
        if path.bytes().all(|byte| byte == b'/') {
            return self.chdir_root();
        }
        let dir = self.open(path, OpenFlags::READ)?;
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }
        self.cwd = dir;
        Ok(())
    }

    pub fn open(&mut self, path: &str, flags: OpenFlags) -> Result<FileHandle, FsError> {
        let mut dir = self.cwd;
        let mut file = FileHandle::new();
        file.open_path(self, &mut dir, path, flags)?;
        Ok(file)
    }

    pub fn exists(&mut self, path: &str) -> Result<bool, FsError> {
        match self.open(path, OpenFlags::READ) {
            Ok(_) => Ok(true),
            Err(FsError::NotFound | FsError::NotADirectory) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub fn mkdir(&mut self, path: &str, create_parents: bool) -> Result<(), FsError> {
        let mut dir = self.cwd;
        let mut sub = FileHandle::new();
        sub.mkdir(self, &mut dir, path, create_parents)?;
        sub.close(self)
    }

    pub fn remove(&mut self, path: &str) -> Result<(), FsError> {
        let mut file = self.open(path, OpenFlags::WRITE)?;
        file.remove(self)
    }

    pub fn rmdir(&mut self, path: &str) -> Result<(), FsError> {
        let mut dir = self.open(path, OpenFlags::READ)?;
        dir.rmdir(self)
    }

    pub fn rename(&mut self, old_path: &str, new_path: &str) -> Result<(), FsError> {
        let mut file = self.open(old_path, OpenFlags::READ)?;
        let mut dir = self.cwd;
        file.rename(self, &mut dir, new_path)
    }

    pub fn truncate(&mut self, path: &str, length: u32) -> Result<(), FsError> {
        let mut file = self.open(path, OpenFlags::WRITE)?;
        file.truncate(self, length)?;
        file.close(self)
    }
}
