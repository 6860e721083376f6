use crate::error::FsError;

/// A packed FAT date and time pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FatTimestamp {
    pub date: u16,
    pub time: u16,
}

/// Supplies the current time for new and modified records.
pub type ClockFn = fn() -> FatTimestamp;

/// Packs a date: bits 15-9 year since 1980, 8-5 month, 4-0 day.
pub const fn fat_date(year: u16, month: u8, day: u8) -> u16 {
    ((year - 1980) << 9) | ((month as u16) << 5) | day as u16
}

/// Packs a time: bits 15-11 hour, 10-5 minute, 4-0 second / 2.
pub const fn fat_time(hour: u8, minute: u8, second: u8) -> u16 {
    ((hour as u16) << 11) | ((minute as u16) << 5) | (second as u16 >> 1)
}

pub const fn fat_year(date: u16) -> u16 {
    1980 + (date >> 9)
}

pub const fn fat_month(date: u16) -> u8 {
    ((date >> 5) & 0x0F) as u8
}

pub const fn fat_day(date: u16) -> u8 {
    (date & 0x1F) as u8
}

pub const fn fat_hour(time: u16) -> u8 {
    (time >> 11) as u8
}

pub const fn fat_minute(time: u16) -> u8 {
    ((time >> 5) & 0x3F) as u8
}

pub const fn fat_second(time: u16) -> u8 {
    ((time & 0x1F) << 1) as u8
}

impl FatTimestamp {
    pub fn new(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<Self, FsError> {
        if !(1980..=2107).contains(&year)
            || !(1..=12).contains(&month)
            || !(1..=31).contains(&day)
            || hour > 23
            || minute > 59
            || second > 59
        {
            return Err(FsError::InvalidTimestamp);
        }
        Ok(Self {
            date: fat_date(year, month, day),
            time: fat_time(hour, minute, second),
        })
    }
}
