use core::fmt;

use embedded_hal::{digital::OutputPin, spi::ErrorKind as SpiErrorKind, spi::SpiBus};

use crate::block::{Block, BlockDevice, BlockError};

pub(super) const SD_CMD0: u8 = 0;
pub(super) const SD_CMD1: u8 = 1;
pub(super) const SD_CMD16: u8 = 16;
pub(super) const SD_CMD17: u8 = 17;
pub(super) const SD_CMD24: u8 = 24;
pub(super) const SD_CMD0_CRC: u8 = 0x95;
pub(super) const SD_CMD0_ATTEMPTS: usize = 16;
pub(super) const SD_R1_POLL: usize = 16;
pub(super) const SD_R1_IDLE: u8 = 0x01;
pub(super) const SD_DATA_START: u8 = 0xFE;
pub(super) const SD_DATA_ACCEPTED: u8 = 0x05;

/// Iteration budget for every busy-wait: activation, data token, write busy.
pub const POLL_LIMIT: u32 = 0xFFFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitError {
    /// No idle response to the reset command; carries the last R1 seen.
    NotDetected(u8),
    /// The card never left the idle state while activating.
    InitTimeout(u8),
    BlockLengthRejected(u8),
    Bus(SpiErrorKind),
    ChipSelect,
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDetected(r1) => write!(f, "card not detected (r1 {:#04x})", r1),
            Self::InitTimeout(r1) => write!(f, "card init timed out (r1 {:#04x})", r1),
            Self::BlockLengthRejected(r1) => write!(f, "block length rejected (r1 {:#04x})", r1),
            Self::Bus(kind) => write!(f, "spi bus error: {:?}", kind),
            Self::ChipSelect => f.write_str("chip select pin error"),
        }
    }
}

impl core::error::Error for InitError {}

/// Failures of the wire itself, shared by init and block I/O.
#[derive(Clone, Copy, Debug)]
pub(super) enum LinkError {
    Bus(SpiErrorKind),
    ChipSelect,
}

impl From<LinkError> for InitError {
    fn from(value: LinkError) -> Self {
        match value {
            LinkError::Bus(kind) => Self::Bus(kind),
            LinkError::ChipSelect => Self::ChipSelect,
        }
    }
}

impl From<LinkError> for BlockError {
    fn from(value: LinkError) -> Self {
        match value {
            LinkError::Bus(kind) => Self::Bus(kind),
            LinkError::ChipSelect => Self::ChipSelect,
        }
    }
}

pub struct SdCard<SPI, CS> {
    pub(super) spi: SPI,
    pub(super) cs: CS,
    pub(super) initialized: bool,
}

impl<SPI, CS> SdCard<SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    pub fn new(spi: SPI, mut cs: CS) -> Self {
        // Deselect early; init drives CS high again and reports pin errors.
        let _ = cs.set_high();
        Self {
            spi,
            cs,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Bus access for clock changes once the card is initialized.
    pub fn spi_mut(&mut self) -> &mut SPI {
        &mut self.spi
    }
}

impl<SPI, CS> BlockDevice for SdCard<SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    fn read_block(&mut self, index: u32, out: &mut Block) -> Result<(), BlockError> {
        SdCard::read_block(self, index, out)
    }

    fn write_block(&mut self, index: u32, data: &Block) -> Result<(), BlockError> {
        SdCard::write_block(self, index, data)
    }
}
