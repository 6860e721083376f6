use sdvolume::Block;

use crate::flags::Attributes;
use crate::name::ShortName;

pub const DIR_RECORD_SIZE: usize = 32;
pub const RECORDS_PER_BLOCK: usize = 16;

/// First name byte of a never-used slot; nothing follows it.
pub const NAME_FREE: u8 = 0x00;
/// First name byte of a deleted, reusable slot.
pub const NAME_DELETED: u8 = 0xE5;

/// Where a record lives on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordSlot {
    pub block: u32,
    pub index: u8,
}

/// One 32-byte directory record, decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct DirRecord {
    pub name: [u8; 11],
    pub attributes: Attributes,
    pub reserved_nt: u8,
    pub creation_time_tenths: u8,
    pub creation_time: u16,
    pub creation_date: u16,
    pub last_access_date: u16,
    pub first_cluster_high: u16,
    pub last_write_time: u16,
    pub last_write_date: u16,
    pub first_cluster_low: u16,
    pub file_size: u32,
}

impl DirRecord {
    pub fn new(name: ShortName) -> Self {
        Self {
            name: *name.as_bytes(),
            ..Self::default()
        }
    }

    pub fn decode(raw: &[u8; DIR_RECORD_SIZE]) -> Self {
        let u16_at = |at: usize| u16::from_le_bytes([raw[at], raw[at + 1]]);
        let mut name = [0u8; 11];
        name.copy_from_slice(&raw[..11]);
        Self {
            name,
            attributes: Attributes::from_bits_retain(raw[11]),
            reserved_nt: raw[12],
            creation_time_tenths: raw[13],
            creation_time: u16_at(14),
            creation_date: u16_at(16),
            last_access_date: u16_at(18),
            first_cluster_high: u16_at(20),
            last_write_time: u16_at(22),
            last_write_date: u16_at(24),
            first_cluster_low: u16_at(26),
            file_size: u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]),
        }
    }

    pub fn encode(&self, out: &mut [u8; DIR_RECORD_SIZE]) {
        out[..11].copy_from_slice(&self.name);
        out[11] = self.attributes.bits();
        out[12] = self.reserved_nt;
        out[13] = self.creation_time_tenths;
        out[14..16].copy_from_slice(&self.creation_time.to_le_bytes());
        out[16..18].copy_from_slice(&self.creation_date.to_le_bytes());
        out[18..20].copy_from_slice(&self.last_access_date.to_le_bytes());
        out[20..22].copy_from_slice(&self.first_cluster_high.to_le_bytes());
        out[22..24].copy_from_slice(&self.last_write_time.to_le_bytes());
        out[24..26].copy_from_slice(&self.last_write_date.to_le_bytes());
        out[26..28].copy_from_slice(&self.first_cluster_low.to_le_bytes());
        out[28..32].copy_from_slice(&self.file_size.to_le_bytes());
    }

    /// Reads record `index` out of a directory block.
    pub fn read_from(block: &Block, index: usize) -> Self {
        let mut raw = [0u8; DIR_RECORD_SIZE];
        let at = index * DIR_RECORD_SIZE;
        raw.copy_from_slice(&block[at..at + DIR_RECORD_SIZE]);
        Self::decode(&raw)
    }

    pub fn write_to(&self, block: &mut Block, index: usize) {
        let mut raw = [0u8; DIR_RECORD_SIZE];
        self.encode(&mut raw);
        let at = index * DIR_RECORD_SIZE;
        block[at..at + DIR_RECORD_SIZE].copy_from_slice(&raw);
    }

    pub fn short_name(&self) -> ShortName {
        ShortName::from_raw(self.name)
    }

    pub fn first_cluster(&self) -> u32 {
        ((self.first_cluster_high as u32) << 16) | self.first_cluster_low as u32
    }

    pub fn set_first_cluster(&mut self, cluster: u32) {
        self.first_cluster_high = (cluster >> 16) as u16;
        self.first_cluster_low = cluster as u16;
    }

    pub fn is_free(&self) -> bool {
        self.name[0] == NAME_FREE
    }

    pub fn is_deleted(&self) -> bool {
        self.name[0] == NAME_DELETED
    }

    /// `.` or `..`.
    pub fn is_dot(&self) -> bool {
        self.name[0] == b'.'
    }

    /// Neither free, deleted, a dot entry, nor a label / long-name slot.
    pub fn is_live(&self) -> bool {
        !self.is_free() && !self.is_deleted() && !self.is_dot() && self.attributes.is_file_or_subdir()
    }

    pub fn is_file(&self) -> bool {
        self.attributes.is_file()
    }

    pub fn is_subdir(&self) -> bool {
        self.attributes.is_subdir()
    }
}
