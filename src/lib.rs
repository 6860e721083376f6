#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod flags;
pub mod fs;
pub mod handle;
pub mod name;
mod path;
pub mod record;
pub mod sink;
pub mod time;

pub use error::FsError;
pub use flags::{Attributes, OpenFlags, TimestampKind};
pub use fs::FatFs;
pub use handle::{FilePos, FileHandle, FileType};
pub use name::ShortName;
pub use record::{DirRecord, RecordSlot};
pub use sink::{ByteSink, FileWriter};
pub use time::{ClockFn, FatTimestamp};

pub use sdvolume;
