use sdvolume::{format, Block, DeviceError, FormatOptions, RamDisk};

use super::*;

const FAT32_BLOCKS: usize = 4200;
const FAT16_BLOCKS: usize = 8500;

fn fat32_fs() -> FatFs<RamDisk<Vec<u8>>> {
    let mut disk = RamDisk::new(vec![0u8; FAT32_BLOCKS * BLOCK_SIZE]);
    format(&mut disk, &FormatOptions::fat32(4)).unwrap();
    FatFs::mount(disk).unwrap()
}

fn fat16_fs() -> FatFs<RamDisk<Vec<u8>>> {
    let mut disk = RamDisk::new(vec![0u8; FAT16_BLOCKS * BLOCK_SIZE]);
    format(&mut disk, &FormatOptions::fat16(2)).unwrap();
    FatFs::mount(disk).unwrap()
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

fn create<D: BlockDevice>(fs: &mut FatFs<D>, path: &str) -> FileHandle {
    fs.open(path, OpenFlags::CREAT | OpenFlags::RDWR).unwrap()
}

/// A RAM disk whose writes can be switched to fail.
struct FlakyDisk {
    inner: RamDisk<Vec<u8>>,
    fail_writes: bool,
}

impl FlakyDisk {
    fn check(&self) -> Result<(), DeviceError> {
        if self.fail_writes {
            Err(DeviceError::Transfer)
        } else {
            Ok(())
        }
    }
}

impl BlockDevice for FlakyDisk {
    fn block_count(&self) -> u32 {
        self.inner.block_count()
    }

    fn read_block(&mut self, lba: u32, out: &mut Block) -> Result<(), DeviceError> {
        self.inner.read_block(lba, out)
    }

    fn write_block(&mut self, lba: u32, data: &Block) -> Result<(), DeviceError> {
        self.check()?;
        self.inner.write_block(lba, data)
    }

    fn read_start(&mut self, lba: u32) -> Result<(), DeviceError> {
        self.inner.read_start(lba)
    }

    fn read_data(&mut self, out: &mut Block) -> Result<(), DeviceError> {
        self.inner.read_data(out)
    }

    fn read_stop(&mut self) -> Result<(), DeviceError> {
        self.inner.read_stop()
    }

    fn write_start(&mut self, lba: u32, count: u32) -> Result<(), DeviceError> {
        self.check()?;
        self.inner.write_start(lba, count)
    }

    fn write_data(&mut self, data: &Block) -> Result<(), DeviceError> {
        self.inner.write_data(data)
    }

    fn write_stop(&mut self) -> Result<(), DeviceError> {
        self.inner.write_stop()
    }
}

#[cfg(feature = "multi-block-io")]
#[test]
fn large_transfers_use_bursts_capped_at_cluster_end() {
    let mut fs = fat32_fs();
    let data = pattern(10_000, 3);

    let mut file = create(&mut fs, "BURST.BIN");
    fs.volume_mut().device_mut().reset_stats();
    assert_eq!(file.write(&mut fs, &data).unwrap(), data.len());
    let stats = fs.volume().device().stats();
    // Four full clusters of four blocks, then three blocks, then a tail.
    assert_eq!(stats.burst_writes, 5);
    assert_eq!(stats.burst_blocks_written, 19);
    file.close(&mut fs).unwrap();

    let mut file = fs.open("BURST.BIN", OpenFlags::READ).unwrap();
    fs.volume_mut().device_mut().reset_stats();
    let mut back = vec![0u8; data.len()];
    assert_eq!(file.read(&mut fs, &mut back).unwrap(), data.len());
    let stats = fs.volume().device().stats();
    assert_eq!(stats.burst_reads, 5);
    assert_eq!(stats.burst_blocks_read, 19);
    assert_eq!(back, data);
}

#[test]
fn short_whole_block_writes_go_straight_to_the_device() {
    let mut fs = fat32_fs();
    let mut file = create(&mut fs, "RAW.BIN");
    fs.volume_mut().device_mut().reset_stats();
    file.write(&mut fs, &pattern(600, 1)).unwrap();
    let stats = fs.volume().device().stats();
    assert_eq!(stats.burst_writes, 0);
    assert_eq!(file.file_size(), 600);
    assert_eq!(file.position(), 600);
}

#[test]
fn burst_read_flushes_a_dirty_cached_block_in_range() {
    let mut fs = fat32_fs();
    let mut file = create(&mut fs, "MIX.BIN");
    let mut data = pattern(1536, 9);
    file.write(&mut fs, &data).unwrap();

    file.seek_set(&mut fs, 600).unwrap();
    file.write(&mut fs, b"0123456789").unwrap();
    data[600..610].copy_from_slice(b"0123456789");

    file.seek_set(&mut fs, 0).unwrap();
    let mut back = vec![0u8; data.len()];
    assert_eq!(file.read(&mut fs, &mut back).unwrap(), data.len());
    assert_eq!(back, data);
}

#[test]
fn raw_block_write_drops_the_stale_cached_copy() {
    let mut fs = fat32_fs();
    let mut file = create(&mut fs, "OVER.BIN");
    file.write(&mut fs, &pattern(100, 0)).unwrap();

    let second = pattern(512, 77);
    file.seek_set(&mut fs, 0).unwrap();
    file.write(&mut fs, &second).unwrap();
    assert_eq!(file.file_size(), 512);

    file.seek_set(&mut fs, 0).unwrap();
    let mut back = vec![0u8; 512];
    file.read(&mut fs, &mut back).unwrap();
    assert_eq!(back, second);
    file.close(&mut fs).unwrap();

    let mut reopened = fs.open("OVER.BIN", OpenFlags::READ).unwrap();
    let mut back = vec![0u8; 512];
    reopened.read(&mut fs, &mut back).unwrap();
    assert_eq!(back, second);
}

#[test]
fn read_stops_at_end_of_file() {
    let mut fs = fat32_fs();
    let mut file = create(&mut fs, "SHORT.TXT");
    file.write(&mut fs, b"hello").unwrap();
    file.seek_set(&mut fs, 2).unwrap();
    let mut buf = [0u8; 16];
    assert_eq!(file.read(&mut fs, &mut buf).unwrap(), 3);
    assert_eq!(&buf[..3], b"llo");
    assert_eq!(file.read(&mut fs, &mut buf).unwrap(), 0);
    assert_eq!(file.available(), 0);
}

#[test]
fn seek_crosses_cluster_boundaries_both_ways() {
    let mut fs = fat32_fs();
    let data = pattern(5000, 5);
    let mut file = create(&mut fs, "SEEK.BIN");
    file.write(&mut fs, &data).unwrap();

    let mut byte = [0u8; 1];
    for pos in [4999u32, 2048, 2047, 0, 4096, 1] {
        file.seek_set(&mut fs, pos).unwrap();
        file.read(&mut fs, &mut byte).unwrap();
        assert_eq!(byte[0], data[pos as usize], "pos {}", pos);
    }

    file.seek_end(&mut fs, -10).unwrap();
    assert_eq!(file.position(), 4990);
    file.seek_cur(&mut fs, 4).unwrap();
    assert_eq!(file.position(), 4994);
}

#[test]
fn out_of_range_seek_keeps_the_cursor() {
    let mut fs = fat32_fs();
    let mut file = create(&mut fs, "RANGE.BIN");
    file.write(&mut fs, &pattern(3000, 2)).unwrap();
    file.seek_set(&mut fs, 2500).unwrap();
    let saved = file.get_pos();

    assert_eq!(file.seek_set(&mut fs, 3001), Err(FsError::SeekOutOfRange));
    assert_eq!(file.seek_cur(&mut fs, -2501), Err(FsError::SeekOutOfRange));
    assert_eq!(file.seek_end(&mut fs, 1), Err(FsError::SeekOutOfRange));
    assert_eq!(file.get_pos(), saved);
}

#[test]
fn saved_position_restores_without_walking() {
    let mut fs = fat32_fs();
    let data = pattern(4500, 11);
    let mut file = create(&mut fs, "POS.BIN");
    file.write(&mut fs, &data).unwrap();
    file.seek_set(&mut fs, 4200).unwrap();
    let pos = file.get_pos();
    assert_eq!(pos.position, 4200);

    file.rewind();
    assert_eq!(file.peek(&mut fs).unwrap(), Some(data[0]));
    assert_eq!(file.position(), 0);

    file.set_pos(pos).unwrap();
    assert_eq!(file.read_byte(&mut fs).unwrap(), Some(data[4200]));
}

#[test]
fn saved_position_past_a_truncated_end_is_rejected() {
    let mut fs = fat32_fs();
    let mut file = create(&mut fs, "CUT.BIN");
    file.write(&mut fs, &pattern(3000, 4)).unwrap();
    file.seek_set(&mut fs, 2500).unwrap();
    let saved = file.get_pos();

    file.truncate(&mut fs, 100).unwrap();
    assert_eq!(file.set_pos(saved), Err(FsError::SeekOutOfRange));
    assert_eq!(file.position(), 100);
    assert_eq!(file.available(), 0);
    let mut buf = [0u8; 16];
    assert_eq!(file.read(&mut fs, &mut buf).unwrap(), 0);
}

#[test]
fn write_failure_is_sticky_and_keeps_size() {
    let mut disk = FlakyDisk {
        inner: RamDisk::new(vec![0u8; FAT32_BLOCKS * BLOCK_SIZE]),
        fail_writes: false,
    };
    format(&mut disk.inner, &FormatOptions::fat32(4)).unwrap();
    let mut fs = FatFs::mount(disk).unwrap();
    let mut file = create(&mut fs, "FLAKY.LOG");
    file.write(&mut fs, &[b'a'; 100]).unwrap();

    fs.volume_mut().device_mut().fail_writes = true;
    assert_eq!(
        file.write(&mut fs, &[b'b'; 600]),
        Err(FsError::Io(DeviceError::Transfer))
    );
    assert!(file.write_error());
    assert_eq!(file.file_size(), 100);

    fs.volume_mut().device_mut().fail_writes = false;
    file.write(&mut fs, b"c").unwrap();
    assert!(file.write_error());
    file.clear_write_error();
    assert!(!file.write_error());
}

#[test]
fn failed_sync_sets_write_error() {
    let mut disk = FlakyDisk {
        inner: RamDisk::new(vec![0u8; FAT32_BLOCKS * BLOCK_SIZE]),
        fail_writes: false,
    };
    format(&mut disk.inner, &FormatOptions::fat32(4)).unwrap();
    let mut fs = FatFs::mount(disk).unwrap();
    let mut file = create(&mut fs, "SYNC.LOG");
    file.write(&mut fs, b"pending").unwrap();

    fs.volume_mut().device_mut().fail_writes = true;
    assert!(file.sync(&mut fs).is_err());
    assert!(file.write_error());
}

#[test]
fn fat16_root_is_a_fixed_region() {
    let mut fs = fat16_fs();
    let root = fs.open_root().unwrap();
    assert_eq!(root.file_type(), FileType::RootFixed);
    assert_eq!(root.first_cluster(), 0);
    assert_eq!(root.file_size(), 512 * DIR_RECORD_SIZE as u32);
    assert!(root.record_slot().is_none());
}

#[test]
fn fat32_root_is_sized_from_its_chain() {
    let mut fs = fat32_fs();
    let root = fs.open_root().unwrap();
    assert_eq!(root.file_type(), FileType::Root32);
    assert_eq!(root.first_cluster(), 2);
    assert_eq!(root.file_size(), 2048);
}

#[test]
fn open_handles_refuse_to_reopen() {
    let mut fs = fat32_fs();
    let mut root = fs.open_root().unwrap();
    assert_eq!(root.open_root(&mut fs), Err(FsError::AlreadyOpen));
    let mut file = create(&mut fs, "A.TXT");
    let mut dir = fs.cwd();
    assert_eq!(
        file.open_path(&mut fs, &mut dir, "A.TXT", OpenFlags::READ),
        Err(FsError::AlreadyOpen)
    );
}

#[test]
fn closed_handle_rejects_io() {
    let mut fs = fat32_fs();
    let mut file = FileHandle::new();
    let mut buf = [0u8; 4];
    assert_eq!(file.read(&mut fs, &mut buf), Err(FsError::NotOpen));
    assert_eq!(file.write(&mut fs, b"x"), Err(FsError::NotOpen));
    assert_eq!(file.sync(&mut fs), Err(FsError::NotOpen));
    assert_eq!(file.seek_set(&mut fs, 0), Err(FsError::NotOpen));
}

#[test]
fn directories_cannot_be_written() {
    let mut fs = fat32_fs();
    let mut root = fs.open_root().unwrap();
    assert_eq!(root.write(&mut fs, b"x"), Err(FsError::NotAFile));
    assert_eq!(root.truncate(&mut fs, 0), Err(FsError::NotAFile));
}

#[test]
fn read_only_handle_rejects_writes_and_write_only_rejects_reads() {
    let mut fs = fat32_fs();
    let mut file = create(&mut fs, "RO.TXT");
    file.write(&mut fs, b"data").unwrap();
    file.close(&mut fs).unwrap();

    let mut reader = fs.open("RO.TXT", OpenFlags::READ).unwrap();
    assert_eq!(reader.write(&mut fs, b"x"), Err(FsError::ReadOnly));
    let mut writer = fs.open("RO.TXT", OpenFlags::WRITE).unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(writer.read(&mut fs, &mut buf), Err(FsError::WriteOnly));
}

#[test]
fn growing_a_directory_zero_fills_the_new_cluster() {
    let mut fs = fat32_fs();
    fs.mkdir("D", false).unwrap();
    // 2048-byte clusters hold 64 records; `.` and `..` take two.
    for i in 0..70 {
        let mut file = create(&mut fs, &format!("D/F{}.TXT", i));
        file.close(&mut fs).unwrap();
    }
    let mut dir = fs.open("D", OpenFlags::READ).unwrap();
    assert_eq!(dir.file_size(), 4096);

    let mut live = 0;
    while dir.read_dir(&mut fs).unwrap().is_some() {
        live += 1;
    }
    assert_eq!(live, 70);
}
