use embedded_hal::{digital::OutputPin, spi::SpiBus};
use log::debug;

use super::driver::{
    InitError, SdCard, POLL_LIMIT, SD_CMD0, SD_CMD0_ATTEMPTS, SD_CMD0_CRC, SD_CMD1, SD_CMD16,
    SD_R1_IDLE,
};
use crate::block::BLOCK_SIZE;

impl<SPI, CS> SdCard<SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    /// Reset handshake: idle, activate, then fix the block length at 512.
    pub fn init(&mut self) -> Result<(), InitError> {
        self.initialized = false;
        let result = self.init_inner();
        self.end_transaction();
        match result {
            Ok(()) => {
                self.initialized = true;
                debug!("sd: init ok");
            }
            Err(err) => debug!("sd: init failed err={:?}", err),
        }
        result
    }

    fn init_inner(&mut self) -> Result<(), InitError> {
        self.cs.set_high().map_err(|_| InitError::ChipSelect)?;
        // At least 74 clocks with CS high before the first command.
        self.send_dummy_clocks(10)?;

        let mut r1 = 0xFFu8;
        for _ in 0..SD_CMD0_ATTEMPTS {
            r1 = self.send_command(SD_CMD0, 0, SD_CMD0_CRC)?;
            if r1 == SD_R1_IDLE {
                break;
            }
        }
        if r1 != SD_R1_IDLE {
            return Err(InitError::NotDetected(r1));
        }

        let mut ready = false;
        for _ in 0..POLL_LIMIT {
            r1 = self.send_command(SD_CMD1, 0, 0xFF)?;
            if r1 == 0x00 {
                ready = true;
                break;
            }
        }
        if !ready {
            return Err(InitError::InitTimeout(r1));
        }

        let r1 = self.send_command(SD_CMD16, BLOCK_SIZE as u32, 0xFF)?;
        if r1 != 0x00 {
            return Err(InitError::BlockLengthRejected(r1));
        }
        Ok(())
    }
}
