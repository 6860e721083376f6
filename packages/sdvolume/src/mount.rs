use crate::block::{Block, BlockDevice, BLOCK_SIZE};
use crate::volume::{FatType, VolumeError};

/// Minimum cluster count of a FAT16 volume; anything smaller is FAT12.
pub const FAT16_MIN_CLUSTERS: u32 = 4085;

/// Volume layout decoded from a BIOS parameter block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub fat_type: FatType,
    pub blocks_per_cluster: u8,
    pub cluster_size_shift: u8,
    pub fat_start_block: u32,
    pub fat_count: u8,
    pub blocks_per_fat: u32,
    /// First block of the fixed root region on FAT16, root cluster on FAT32.
    pub root_dir_start: u32,
    pub root_dir_entry_count: u16,
    pub data_start_block: u32,
    pub cluster_count: u32,
}

pub(crate) fn read_geometry<D: BlockDevice>(device: &mut D) -> Result<Geometry, VolumeError> {
    let mut block0 = [0u8; BLOCK_SIZE];
    device.read_block(0, &mut block0)?;

    if let Some(start) = first_fat_partition_lba(&block0) {
        let mut boot = [0u8; BLOCK_SIZE];
        device.read_block(start, &mut boot)?;
        if let Ok(geometry) = parse_boot_block(start, &boot) {
            return Ok(geometry);
        }
    }

    parse_boot_block(0, &block0)
}

pub fn parse_boot_block(partition_start: u32, boot: &Block) -> Result<Geometry, VolumeError> {
    if boot[510] != 0x55 || boot[511] != 0xAA {
        return Err(VolumeError::InvalidBootSector);
    }

    let bytes_per_sector = u16::from_le_bytes([boot[11], boot[12]]);
    if bytes_per_sector != BLOCK_SIZE as u16 {
        return Err(VolumeError::UnsupportedSectorSize(bytes_per_sector));
    }

    let blocks_per_cluster = boot[13];
    if blocks_per_cluster == 0 || !blocks_per_cluster.is_power_of_two() {
        return Err(VolumeError::UnsupportedSectorsPerCluster(blocks_per_cluster));
    }

    let reserved = u16::from_le_bytes([boot[14], boot[15]]) as u32;
    let fat_count = boot[16];
    if fat_count == 0 || reserved == 0 {
        return Err(VolumeError::InvalidBootSector);
    }

    let root_dir_entry_count = u16::from_le_bytes([boot[17], boot[18]]);
    let fat_size_16 = u16::from_le_bytes([boot[22], boot[23]]) as u32;
    let fat_size_32 = u32::from_le_bytes([boot[36], boot[37], boot[38], boot[39]]);
    let blocks_per_fat = if fat_size_16 != 0 { fat_size_16 } else { fat_size_32 };
    if blocks_per_fat == 0 {
        return Err(VolumeError::UnsupportedFatType);
    }

    let total_16 = u16::from_le_bytes([boot[19], boot[20]]) as u32;
    let total_32 = u32::from_le_bytes([boot[32], boot[33], boot[34], boot[35]]);
    let total_blocks = if total_16 != 0 { total_16 } else { total_32 };
    if total_blocks == 0 {
        return Err(VolumeError::InvalidBootSector);
    }

    let fat_start_block = partition_start.saturating_add(reserved);
    let root_start_block =
        fat_start_block.saturating_add(blocks_per_fat.saturating_mul(fat_count as u32));
    let root_blocks = (root_dir_entry_count as u32 * 32).div_ceil(BLOCK_SIZE as u32);
    let data_start_block = root_start_block.saturating_add(root_blocks);

    let used = data_start_block - partition_start;
    if total_blocks <= used {
        return Err(VolumeError::InvalidBootSector);
    }
    let cluster_count = (total_blocks - used) / blocks_per_cluster as u32;

    let is_fat32 = fat_size_16 == 0 && root_dir_entry_count == 0;
    let (fat_type, root_dir_start) = if is_fat32 {
        let root_cluster = u32::from_le_bytes([boot[44], boot[45], boot[46], boot[47]]);
        if root_cluster < 2 || root_cluster > cluster_count + 1 {
            return Err(VolumeError::InvalidBootSector);
        }
        (FatType::Fat32, root_cluster)
    } else {
        if cluster_count < FAT16_MIN_CLUSTERS {
            return Err(VolumeError::UnsupportedFatType);
        }
        (FatType::Fat16, root_start_block)
    };

    // The FAT itself must be able to describe every cluster.
    let fat_capacity = blocks_per_fat * BLOCK_SIZE as u32 / fat_type.entry_size();
    if fat_capacity < cluster_count + 2 {
        return Err(VolumeError::InvalidBootSector);
    }

    Ok(Geometry {
        fat_type,
        blocks_per_cluster,
        cluster_size_shift: blocks_per_cluster.trailing_zeros() as u8,
        fat_start_block,
        fat_count,
        blocks_per_fat,
        root_dir_start,
        root_dir_entry_count,
        data_start_block,
        cluster_count,
    })
}

fn first_fat_partition_lba(block0: &Block) -> Option<u32> {
    if block0[510] != 0x55 || block0[511] != 0xAA {
        return None;
    }
    for i in 0..4 {
        let base = 446 + i * 16;
        let is_fat = matches!(block0[base + 4], 0x0B | 0x0C | 0x0E | 0x06 | 0x04);
        if !is_fat {
            continue;
        }
        let start = u32::from_le_bytes([
            block0[base + 8],
            block0[base + 9],
            block0[base + 10],
            block0[base + 11],
        ]);
        if start != 0 {
            return Some(start);
        }
    }
    None
}
