use core::fmt;

use embedded_hal::spi::ErrorKind as SpiErrorKind;

pub const BLOCK_SIZE: usize = 512;

pub type Block = [u8; BLOCK_SIZE];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockError {
    NotInitialized,
    ReadFailed,
    /// Raw R1 or data-response token the card answered a write with.
    WriteRejected(u8),
    WriteBusyTimeout,
    Bus(SpiErrorKind),
    ChipSelect,
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => f.write_str("card not initialized"),
            Self::ReadFailed => f.write_str("block read failed"),
            Self::WriteRejected(token) => write!(f, "block write rejected (token {:#04x})", token),
            Self::WriteBusyTimeout => f.write_str("card stayed busy after write"),
            Self::Bus(kind) => write!(f, "spi bus error: {:?}", kind),
            Self::ChipSelect => f.write_str("chip select pin error"),
        }
    }
}

impl core::error::Error for BlockError {}

/// Linear 512-byte block storage.
pub trait BlockDevice {
    fn read_block(&mut self, index: u32, out: &mut Block) -> Result<(), BlockError>;
    fn write_block(&mut self, index: u32, data: &Block) -> Result<(), BlockError>;
}

impl<T: BlockDevice + ?Sized> BlockDevice for &mut T {
    fn read_block(&mut self, index: u32, out: &mut Block) -> Result<(), BlockError> {
        (**self).read_block(index, out)
    }

    fn write_block(&mut self, index: u32, data: &Block) -> Result<(), BlockError> {
        (**self).write_block(index, data)
    }
}
