//! Numbered capture sessions: each power-on logs into a fresh directory
//! named one past the highest numbered entry of the current directory.

use core::fmt::Write as _;

use heapless::String;
use log::info;

use crate::block::BlockDevice;
use crate::fat::{FsError, Volume};

/// Directory names are plain decimal numbers of at most eight digits.
pub const SESSION_NAME_LEN: usize = 8;
const SESSION_NUMBER_LIMIT: u32 = 100_000_000;

pub fn session_name(number: u32) -> String<SESSION_NAME_LEN> {
    let mut name = String::new();
    // Eight digits always fit.
    let _ = write!(name, "{}", number % SESSION_NUMBER_LIMIT);
    name
}

/// Creates the next numbered directory and moves into it.
pub fn open_next_session<D: BlockDevice>(volume: &mut Volume<D>) -> Result<u32, FsError> {
    let number = (volume.highest_numeric_name()? + 1) % SESSION_NUMBER_LIMIT;
    let name = session_name(number);
    volume.make_directory(&name)?;
    volume.change_directory(&name)?;
    info!("session: opened {}", number);
    Ok(number)
}

/// Returns to the directory the session was opened from.
pub fn close_session<D: BlockDevice>(volume: &mut Volume<D>) -> Result<(), FsError> {
    volume.change_directory("..")?;
    info!("session: closed");
    Ok(())
}
