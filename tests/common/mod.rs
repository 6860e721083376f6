#![allow(dead_code)]

use sdlog::sdvolume::{format, FormatOptions, RamDisk, BLOCK_SIZE};
use sdlog::{FatFs, OpenFlags};

pub type Disk = RamDisk<Vec<u8>>;

pub const FAT16_BLOCKS: usize = 8500;
pub const FAT32_BLOCKS: usize = 4200;

fn image(blocks: usize, options: &FormatOptions) -> Disk {
    let mut disk = RamDisk::new(vec![0u8; blocks * BLOCK_SIZE]);
    format(&mut disk, options).unwrap();
    disk
}

pub fn fat16_fs() -> FatFs<Disk> {
    FatFs::mount(image(FAT16_BLOCKS, &FormatOptions::fat16(2))).unwrap()
}

pub fn fat32_fs() -> FatFs<Disk> {
    FatFs::mount(image(FAT32_BLOCKS, &FormatOptions::fat32(4))).unwrap()
}

/// FAT16 with a root directory of only 32 records.
pub fn small_root_fs() -> FatFs<Disk> {
    let options = FormatOptions {
        root_entries: 32,
        ..FormatOptions::fat16(2)
    };
    FatFs::mount(image(FAT16_BLOCKS, &options)).unwrap()
}

pub fn both() -> [FatFs<Disk>; 2] {
    [fat16_fs(), fat32_fs()]
}

pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| ((i * 7 + i / 251) as u8).wrapping_add(seed))
        .collect()
}

pub fn write_file(fs: &mut FatFs<Disk>, path: &str, data: &[u8]) {
    let mut file = fs
        .open(path, OpenFlags::CREAT | OpenFlags::WRITE | OpenFlags::TRUNC)
        .unwrap();
    assert_eq!(file.write(fs, data).unwrap(), data.len());
    file.close(fs).unwrap();
}

pub fn read_file(fs: &mut FatFs<Disk>, path: &str) -> Vec<u8> {
    let mut file = fs.open(path, OpenFlags::READ).unwrap();
    let mut out = vec![0u8; file.file_size() as usize];
    assert_eq!(file.read(fs, &mut out).unwrap(), out.len());
    out
}

pub fn free_clusters(fs: &mut FatFs<Disk>) -> u32 {
    fs.volume_mut().free_cluster_count().unwrap()
}
