use crate::block::{Block, BlockDevice, BLOCK_SIZE};
use crate::mount::FAT16_MIN_CLUSTERS;
use crate::volume::{FatType, VolumeError};

const FAT16_MAX_CLUSTERS: u32 = 65_524;
const FAT32_ROOT_CLUSTER: u32 = 2;
const FSINFO_BLOCK: u16 = 1;
const BACKUP_BOOT_BLOCK: u16 = 6;
const MEDIA_FIXED: u8 = 0xF8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatOptions {
    pub fat_type: FatType,
    pub blocks_per_cluster: u8,
    pub fat_count: u8,
    /// Fixed root directory size for FAT16, rounded up to a whole block.
    pub root_entries: u16,
    pub volume_id: u32,
}

impl FormatOptions {
    pub const fn fat16(blocks_per_cluster: u8) -> Self {
        Self {
            fat_type: FatType::Fat16,
            blocks_per_cluster,
            fat_count: 2,
            root_entries: 512,
            volume_id: 0x5D10_0001,
        }
    }

    pub const fn fat32(blocks_per_cluster: u8) -> Self {
        Self {
            fat_type: FatType::Fat32,
            blocks_per_cluster,
            fat_count: 2,
            root_entries: 0,
            volume_id: 0x5D10_0002,
        }
    }
}

struct Layout {
    total_blocks: u32,
    reserved: u32,
    blocks_per_fat: u32,
    root_entries: u16,
    root_blocks: u32,
    cluster_count: u32,
}

impl Layout {
    fn data_start(&self, fat_count: u8) -> u32 {
        self.reserved + self.blocks_per_fat * fat_count as u32 + self.root_blocks
    }
}

/// Writes an empty superfloppy FAT16 or FAT32 file system across the device.
pub fn format<D: BlockDevice>(device: &mut D, options: &FormatOptions) -> Result<(), VolumeError> {
    let layout = plan(device.block_count(), options)?;
    let zero: Block = [0; BLOCK_SIZE];

    let data_start = layout.data_start(options.fat_count);
    for lba in 0..data_start {
        device.write_block(lba, &zero)?;
    }
    if options.fat_type == FatType::Fat32 {
        let root = data_start + ((FAT32_ROOT_CLUSTER - 2) * options.blocks_per_cluster as u32);
        for lba in root..root + options.blocks_per_cluster as u32 {
            device.write_block(lba, &zero)?;
        }
    }

    let boot = boot_block(&layout, options);
    device.write_block(0, &boot)?;
    if options.fat_type == FatType::Fat32 {
        device.write_block(BACKUP_BOOT_BLOCK as u32, &boot)?;
        device.write_block(FSINFO_BLOCK as u32, &fs_info_block())?;
    }

    let mut fat0 = [0u8; BLOCK_SIZE];
    match options.fat_type {
        FatType::Fat16 => {
            fat0[0..2].copy_from_slice(&(0xFF00 | MEDIA_FIXED as u16).to_le_bytes());
            fat0[2..4].copy_from_slice(&0xFFFFu16.to_le_bytes());
        }
        FatType::Fat32 => {
            fat0[0..4].copy_from_slice(&(0x0FFF_FF00 | MEDIA_FIXED as u32).to_le_bytes());
            fat0[4..8].copy_from_slice(&0x0FFF_FFFFu32.to_le_bytes());
            fat0[8..12].copy_from_slice(&0x0FFF_FFFFu32.to_le_bytes());
        }
    }
    for copy in 0..options.fat_count as u32 {
        device.write_block(layout.reserved + copy * layout.blocks_per_fat, &fat0)?;
    }

    log::debug!(
        "sdvol: formatted fat={:?} blocks={} clusters={} blocks_per_fat={}",
        options.fat_type,
        layout.total_blocks,
        layout.cluster_count,
        layout.blocks_per_fat
    );
    Ok(())
}

fn plan(total_blocks: u32, options: &FormatOptions) -> Result<Layout, VolumeError> {
    let per_cluster = options.blocks_per_cluster;
    if per_cluster == 0 || !per_cluster.is_power_of_two() {
        return Err(VolumeError::UnsupportedSectorsPerCluster(per_cluster));
    }
    if options.fat_count == 0 {
        return Err(VolumeError::InvalidArgument);
    }

    let (reserved, root_entries) = match options.fat_type {
        FatType::Fat16 => {
            if options.root_entries == 0 {
                return Err(VolumeError::InvalidArgument);
            }
            (1, options.root_entries.next_multiple_of(16))
        }
        FatType::Fat32 => (32, 0),
    };
    let root_blocks = root_entries as u32 * 32 / BLOCK_SIZE as u32;
    let entry_size = options.fat_type.entry_size();

    let mut blocks_per_fat = 1;
    let cluster_count = loop {
        let meta = reserved + blocks_per_fat * options.fat_count as u32 + root_blocks;
        if meta >= total_blocks {
            return Err(VolumeError::DeviceTooSmall);
        }
        let clusters = (total_blocks - meta) / per_cluster as u32;
        let needed = ((clusters + 2) * entry_size).div_ceil(BLOCK_SIZE as u32);
        if needed <= blocks_per_fat {
            break clusters;
        }
        blocks_per_fat = needed;
    };

    match options.fat_type {
        FatType::Fat16 if !(FAT16_MIN_CLUSTERS..=FAT16_MAX_CLUSTERS).contains(&cluster_count) => {
            return Err(VolumeError::UnsupportedFatType);
        }
        FatType::Fat32 if cluster_count == 0 => return Err(VolumeError::DeviceTooSmall),
        _ => {}
    }

    Ok(Layout {
        total_blocks,
        reserved,
        blocks_per_fat,
        root_entries,
        root_blocks,
        cluster_count,
    })
}

fn boot_block(layout: &Layout, options: &FormatOptions) -> Block {
    let mut boot = [0u8; BLOCK_SIZE];
    let jump = match options.fat_type {
        FatType::Fat16 => 0x3C,
        FatType::Fat32 => 0x58,
    };
    boot[0..3].copy_from_slice(&[0xEB, jump, 0x90]);
    boot[3..11].copy_from_slice(b"SDLOG1.0");
    boot[11..13].copy_from_slice(&(BLOCK_SIZE as u16).to_le_bytes());
    boot[13] = options.blocks_per_cluster;
    boot[14..16].copy_from_slice(&(layout.reserved as u16).to_le_bytes());
    boot[16] = options.fat_count;
    boot[17..19].copy_from_slice(&layout.root_entries.to_le_bytes());
    boot[21] = MEDIA_FIXED;
    boot[24..26].copy_from_slice(&63u16.to_le_bytes());
    boot[26..28].copy_from_slice(&255u16.to_le_bytes());

    match (options.fat_type, u16::try_from(layout.total_blocks)) {
        (FatType::Fat16, Ok(small)) => boot[19..21].copy_from_slice(&small.to_le_bytes()),
        _ => boot[32..36].copy_from_slice(&layout.total_blocks.to_le_bytes()),
    }

    let ext = match options.fat_type {
        FatType::Fat16 => {
            boot[22..24].copy_from_slice(&(layout.blocks_per_fat as u16).to_le_bytes());
            36
        }
        FatType::Fat32 => {
            boot[36..40].copy_from_slice(&layout.blocks_per_fat.to_le_bytes());
            boot[44..48].copy_from_slice(&FAT32_ROOT_CLUSTER.to_le_bytes());
            boot[48..50].copy_from_slice(&FSINFO_BLOCK.to_le_bytes());
            boot[50..52].copy_from_slice(&BACKUP_BOOT_BLOCK.to_le_bytes());
            64
        }
    };
    boot[ext] = 0x80;
    boot[ext + 2] = 0x29;
    boot[ext + 3..ext + 7].copy_from_slice(&options.volume_id.to_le_bytes());
    boot[ext + 7..ext + 18].copy_from_slice(b"NO NAME    ");
    let label = match options.fat_type {
        FatType::Fat16 => b"FAT16   ",
        FatType::Fat32 => b"FAT32   ",
    };
    boot[ext + 18..ext + 26].copy_from_slice(label);

    boot[510] = 0x55;
    boot[511] = 0xAA;
    boot
}

fn fs_info_block() -> Block {
    let mut info = [0u8; BLOCK_SIZE];
    info[0..4].copy_from_slice(&0x4161_5252u32.to_le_bytes());
    info[484..488].copy_from_slice(&0x6141_7272u32.to_le_bytes());
    info[488..492].copy_from_slice(&u32::MAX.to_le_bytes());
    info[492..496].copy_from_slice(&u32::MAX.to_le_bytes());
    info[508..512].copy_from_slice(&0xAA55_0000u32.to_le_bytes());
    info
}
