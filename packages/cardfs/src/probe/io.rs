use embedded_hal::{
    digital::OutputPin,
    spi::{Error as _, SpiBus},
};

use super::driver::{
    LinkError, SdCard, POLL_LIMIT, SD_CMD17, SD_CMD24, SD_DATA_ACCEPTED, SD_DATA_START,
    SD_R1_POLL,
};
use crate::block::{Block, BlockError, BLOCK_SIZE};

impl<SPI, CS> SdCard<SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    pub fn read_block(&mut self, index: u32, out: &mut Block) -> Result<(), BlockError> {
        if !self.initialized {
            return Err(BlockError::NotInitialized);
        }
        let result = self.read_block_inner(index, out);
        self.end_transaction();
        result
    }

    pub fn write_block(&mut self, index: u32, data: &Block) -> Result<(), BlockError> {
        if !self.initialized {
            return Err(BlockError::NotInitialized);
        }
        let result = self.write_block_inner(index, data);
        self.end_transaction();
        result
    }

    fn read_block_inner(&mut self, index: u32, out: &mut Block) -> Result<(), BlockError> {
        let addr = index.saturating_mul(BLOCK_SIZE as u32);
        let r1 = self.send_command_hold_cs(SD_CMD17, addr, 0xFF)?;
        if (r1 & 0x80) == 0 && r1 != 0x00 {
            return Err(BlockError::ReadFailed);
        }

        let mut token = 0xFFu8;
        for _ in 0..POLL_LIMIT {
            token = self.transfer_byte(0xFF)?;
            if token != 0xFF {
                break;
            }
        }
        if token != SD_DATA_START {
            return Err(BlockError::ReadFailed);
        }

        for slot in out.iter_mut() {
            *slot = self.transfer_byte(0xFF)?;
        }
        // Discard data CRC16.
        let _ = self.transfer_byte(0xFF)?;
        let _ = self.transfer_byte(0xFF)?;
        Ok(())
    }

    fn write_block_inner(&mut self, index: u32, data: &Block) -> Result<(), BlockError> {
        let addr = index.saturating_mul(BLOCK_SIZE as u32);
        let r1 = self.send_command_hold_cs(SD_CMD24, addr, 0xFF)?;
        if r1 != 0x00 {
            return Err(BlockError::WriteRejected(r1));
        }

        let _ = self.transfer_byte(0xFF)?;
        let _ = self.transfer_byte(SD_DATA_START)?;
        for &byte in data.iter() {
            let _ = self.transfer_byte(byte)?;
        }
        // CRC is ignored in SPI mode unless explicitly enabled.
        let _ = self.transfer_byte(0xFF)?;
        let _ = self.transfer_byte(0xFF)?;

        let response = self.transfer_byte(0xFF)?;
        if (response & 0x1F) != SD_DATA_ACCEPTED {
            return Err(BlockError::WriteRejected(response));
        }

        // The card holds MISO low while it programs the block.
        for _ in 0..POLL_LIMIT {
            if self.transfer_byte(0xFF)? != 0x00 {
                return Ok(());
            }
        }
        Err(BlockError::WriteBusyTimeout)
    }

    pub(super) fn send_command(&mut self, cmd: u8, arg: u32, crc: u8) -> Result<u8, LinkError> {
        let r1 = self.send_command_hold_cs(cmd, arg, crc);
        self.end_transaction();
        r1
    }

    pub(super) fn send_command_hold_cs(
        &mut self,
        cmd: u8,
        arg: u32,
        crc: u8,
    ) -> Result<u8, LinkError> {
        self.cs.set_low().map_err(|_| LinkError::ChipSelect)?;
        let _ = self.transfer_byte(0xFF)?;
        for byte in command_frame(cmd, arg, crc) {
            let _ = self.transfer_byte(byte)?;
        }

        let mut r1 = 0xFFu8;
        for _ in 0..SD_R1_POLL {
            r1 = self.transfer_byte(0xFF)?;
            if (r1 & 0x80) == 0 {
                break;
            }
        }
        Ok(r1)
    }

    pub(super) fn send_dummy_clocks(&mut self, bytes: usize) -> Result<(), LinkError> {
        for _ in 0..bytes {
            let _ = self.transfer_byte(0xFF)?;
        }
        Ok(())
    }

    pub(super) fn transfer_byte(&mut self, byte: u8) -> Result<u8, LinkError> {
        let mut frame = [byte];
        self.spi
            .transfer_in_place(&mut frame)
            .map_err(|err| LinkError::Bus(err.kind()))?;
        Ok(frame[0])
    }

    pub(super) fn end_transaction(&mut self) {
        let _ = self.cs.set_high();
        let _ = self.transfer_byte(0xFF);
    }
}

/// Command token, big-endian argument, CRC with the end bit.
pub(super) fn command_frame(cmd: u8, arg: u32, crc: u8) -> [u8; 6] {
    let arg = arg.to_be_bytes();
    [0x40 | cmd, arg[0], arg[1], arg[2], arg[3], crc]
}
