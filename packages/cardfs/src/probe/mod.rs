//! SPI-mode SD/MMC block transport.
//!
//! Every call busy-polls the card to completion; the only timeout is the fixed
//! iteration budget in [`POLL_LIMIT`].

mod driver;
mod init;
mod io;

pub use driver::{InitError, SdCard, POLL_LIMIT};
