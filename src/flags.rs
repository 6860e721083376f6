use crate::error::FsError;

bitflags::bitflags! {
    /// Open modes. The numeric values match the classic embedded FAT API.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OpenFlags: u8 {
        const READ = 0x01;
        const WRITE = 0x02;
        const RDWR = Self::READ.bits() | Self::WRITE.bits();
        /// Every write lands at end of file.
        const APPEND = 0x04;
        /// Sync after every write call.
        const SYNC = 0x08;
        /// Truncate to zero length on open.
        const TRUNC = 0x10;
        /// Position at end of file after open.
        const AT_END = 0x20;
        const CREAT = 0x40;
        const EXCL = 0x80;
    }
}

impl OpenFlags {
    /// Modes that stay on the handle after open.
    pub(crate) const RETAINED: Self = Self::RDWR.union(Self::APPEND).union(Self::SYNC);

    pub(crate) fn validate(self) -> Result<(), FsError> {
        if self.contains(Self::EXCL) && !self.contains(Self::CREAT) {
            return Err(FsError::InvalidFlags);
        }
        Ok(())
    }
}

bitflags::bitflags! {
    /// Record attribute byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
        const LONG_NAME = 0x0F;
    }
}

impl Attributes {
    const FILE_TYPE_MASK: Self = Self::VOLUME_ID.union(Self::DIRECTORY);

    pub fn is_file(self) -> bool {
        self.intersection(Self::FILE_TYPE_MASK).is_empty()
    }

    pub fn is_subdir(self) -> bool {
        self.intersection(Self::FILE_TYPE_MASK) == Self::DIRECTORY
    }

    pub fn is_file_or_subdir(self) -> bool {
        !self.contains(Self::VOLUME_ID)
    }
}

bitflags::bitflags! {
    /// Which record timestamps `FileHandle::timestamp` updates.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TimestampKind: u8 {
        const ACCESS = 0x01;
        const CREATE = 0x02;
        const WRITE = 0x04;
    }
}
