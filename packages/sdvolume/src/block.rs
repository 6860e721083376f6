use core::fmt;

pub const BLOCK_SIZE: usize = 512;

pub type Block = [u8; BLOCK_SIZE];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceError {
    OutOfRange(u32),
    Transfer,
    BurstSequence,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange(lba) => write!(f, "block {} out of range", lba),
            Self::Transfer => f.write_str("transfer failed"),
            Self::BurstSequence => f.write_str("burst transfer out of sequence"),
        }
    }
}

/// Block-addressed storage with 512-byte blocks.
///
/// Burst transfers are a start / data.. / stop sequence over consecutive
/// blocks. Devices without a native multi-block mode can drive the sequence
/// through a [`BurstCursor`].
pub trait BlockDevice {
    fn block_count(&self) -> u32;
    fn read_block(&mut self, lba: u32, out: &mut Block) -> Result<(), DeviceError>;
    fn write_block(&mut self, lba: u32, data: &Block) -> Result<(), DeviceError>;

    fn read_start(&mut self, lba: u32) -> Result<(), DeviceError>;
    fn read_data(&mut self, out: &mut Block) -> Result<(), DeviceError>;
    fn read_stop(&mut self) -> Result<(), DeviceError>;

    fn write_start(&mut self, lba: u32, count: u32) -> Result<(), DeviceError>;
    fn write_data(&mut self, data: &Block) -> Result<(), DeviceError>;
    fn write_stop(&mut self) -> Result<(), DeviceError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Burst {
    Read { next: u32 },
    Write { next: u32, remaining: u32 },
}

/// Tracks an in-flight burst so it can be served one block at a time.
#[derive(Clone, Copy, Debug, Default)]
pub struct BurstCursor {
    state: Option<Burst>,
}

impl BurstCursor {
    pub const fn new() -> Self {
        Self { state: None }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn begin_read(&mut self, lba: u32) -> Result<(), DeviceError> {
        if self.state.is_some() {
            return Err(DeviceError::BurstSequence);
        }
        self.state = Some(Burst::Read { next: lba });
        Ok(())
    }

    /// Returns the block the next `read_data` must fill.
    pub fn next_read(&mut self) -> Result<u32, DeviceError> {
        match &mut self.state {
            Some(Burst::Read { next }) => {
                let lba = *next;
                *next = next.wrapping_add(1);
                Ok(lba)
            }
            _ => Err(DeviceError::BurstSequence),
        }
    }

    pub fn end_read(&mut self) -> Result<(), DeviceError> {
        match self.state.take() {
            Some(Burst::Read { .. }) => Ok(()),
            other => {
                self.state = other;
                Err(DeviceError::BurstSequence)
            }
        }
    }

    pub fn begin_write(&mut self, lba: u32, count: u32) -> Result<(), DeviceError> {
        if self.state.is_some() || count == 0 {
            return Err(DeviceError::BurstSequence);
        }
        self.state = Some(Burst::Write {
            next: lba,
            remaining: count,
        });
        Ok(())
    }

    /// Returns the block the next `write_data` lands on.
    pub fn next_write(&mut self) -> Result<u32, DeviceError> {
        match &mut self.state {
            Some(Burst::Write { next, remaining }) if *remaining > 0 => {
                let lba = *next;
                *next = next.wrapping_add(1);
                *remaining -= 1;
                Ok(lba)
            }
            _ => Err(DeviceError::BurstSequence),
        }
    }

    /// Ends a write burst. Stopping early is allowed; the announced count
    /// is only an upper bound.
    pub fn end_write(&mut self) -> Result<(), DeviceError> {
        match self.state.take() {
            Some(Burst::Write { .. }) => Ok(()),
            other => {
                self.state = other;
                Err(DeviceError::BurstSequence)
            }
        }
    }
}
