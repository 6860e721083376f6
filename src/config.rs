use crate::time::{fat_date, fat_time};

/// Remaining transfer length at which reads and writes switch to burst I/O.
pub const BURST_MIN_BYTES: usize = 1024;

/// Whether the burst strategy is compiled in.
pub const MULTI_BLOCK_IO: bool = cfg!(feature = "multi-block-io");

/// Directory components a path may contain before its leaf.
pub const MAX_PATH_DEPTH: usize = 8;

/// A directory may not grow to this many records.
pub const MAX_DIR_RECORDS: u32 = 0xFFFF;

/// A directory chain longer than this many blocks is treated as corrupt.
pub const MAX_DIR_BLOCKS: u32 = 4096;

/// Stamped on new records when no clock is installed.
pub const DEFAULT_DATE: u16 = fat_date(2000, 1, 1);
pub const DEFAULT_TIME: u16 = fat_time(1, 0, 0);
