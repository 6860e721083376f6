#![cfg_attr(not(test), no_std)]

pub mod block;
pub mod cache;
pub mod format;
pub mod mount;
pub mod ram_disk;
pub mod storage;
pub mod volume;

pub use block::{Block, BlockDevice, BurstCursor, DeviceError, BLOCK_SIZE};
pub use cache::CacheMode;
pub use format::{format, FormatOptions};
pub use ram_disk::{IoStats, RamDisk};
pub use storage::StorageDevice;
pub use volume::{FatType, Volume, VolumeError};
