use core::fmt;

use sdvolume::{DeviceError, VolumeError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsError {
    NotOpen,
    AlreadyOpen,
    NotADirectory,
    NotAFile,
    ReadOnly,
    WriteOnly,
    NameInvalid,
    PathTooDeep,
    NotFound,
    AlreadyExists,
    DirectoryFull,
    DirectoryNotEmpty,
    DiskFull,
    Io(DeviceError),
    /// The record behind an open handle was deleted through another handle.
    Stale,
    SeekOutOfRange,
    InvalidFlags,
    InvalidTimestamp,
    BufferTooSmall { needed: usize },
    Volume(VolumeError),
}

impl From<VolumeError> for FsError {
    fn from(value: VolumeError) -> Self {
        match value {
            VolumeError::DiskFull => Self::DiskFull,
            VolumeError::Device(err) => Self::Io(err),
            other => Self::Volume(other),
        }
    }
}

impl From<DeviceError> for FsError {
    fn from(value: DeviceError) -> Self {
        Self::Io(value)
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOpen => f.write_str("file not open"),
            Self::AlreadyOpen => f.write_str("handle already open"),
            Self::NotADirectory => f.write_str("not a directory"),
            Self::NotAFile => f.write_str("not a regular file"),
            Self::ReadOnly => f.write_str("read-only"),
            Self::WriteOnly => f.write_str("not open for reading"),
            Self::NameInvalid => f.write_str("invalid 8.3 name"),
            Self::PathTooDeep => f.write_str("path too deep"),
            Self::NotFound => f.write_str("not found"),
            Self::AlreadyExists => f.write_str("already exists"),
            Self::DirectoryFull => f.write_str("directory full"),
            Self::DirectoryNotEmpty => f.write_str("directory not empty"),
            Self::DiskFull => f.write_str("disk full"),
            Self::Io(err) => write!(f, "i/o error: {}", err),
            Self::Stale => f.write_str("record removed by another handle"),
            Self::SeekOutOfRange => f.write_str("position out of range"),
            Self::InvalidFlags => f.write_str("invalid open flags"),
            Self::InvalidTimestamp => f.write_str("invalid timestamp"),
            Self::BufferTooSmall { needed } => write!(f, "buffer too small, need {}", needed),
            Self::Volume(err) => write!(f, "volume error: {}", err),
        }
    }
}
