use core::fmt::Write as _;

use cardfs::{session, FsError, SdCard, Volume};
use embassy_time::{Duration, Instant, Ticker};
use esp_hal::{gpio::Output, spi::master::Spi, Blocking};
use esp_println::println;
use heapless::String;

use super::{
    config::{LOG_FILE_NAME, LOG_INTERVAL_SECONDS, LOG_LINE_LEN},
    halt_forever,
};

pub(crate) type CardVolume = Volume<SdCard<Spi<'static, Blocking>, Output<'static>>>;

#[embassy_executor::task]
pub(crate) async fn storage_task(mut volume: CardVolume) {
    let session_number = match session::open_next_session(&mut volume) {
        Ok(number) => number,
        Err(err) => {
            println!("storage: cannot open session: {}", err);
            halt_forever();
        }
    };
    println!("storage: logging to session {}", session_number);

    let boot_instant = Instant::now();
    let mut ticker = Ticker::every(Duration::from_secs(LOG_INTERVAL_SECONDS));

    loop {
        ticker.next().await;
        let uptime_seconds = Instant::now()
            .saturating_duration_since(boot_instant)
            .as_secs();

        let mut line: String<LOG_LINE_LEN> = String::new();
        let _ = writeln!(line, "{},{}", session_number, uptime_seconds);

        match append_line(&mut volume, line.as_str()) {
            Ok(size) => log::debug!("storage: {} now {} bytes", LOG_FILE_NAME, size),
            Err(FsError::FilesystemFull) => {
                println!("storage: card full, stopping");
                let _ = session::close_session(&mut volume);
                halt_forever();
            }
            Err(err) => println!("storage: append failed: {}", err),
        }
    }
}

/// Appends one line to the session log, creating the file on first use.
fn append_line(volume: &mut CardVolume, line: &str) -> Result<u32, FsError> {
    let mut writer = match volume.lookup(LOG_FILE_NAME)? {
        Some(entry) if entry.size > 0 => volume.start_append(LOG_FILE_NAME)?,
        Some(_) => {
            // An empty entry left by an interrupted first write.
            volume.delete(LOG_FILE_NAME)?;
            volume.start_new(LOG_FILE_NAME)?
        }
        None => volume.start_new(LOG_FILE_NAME)?,
    };
    writer.append(line.as_bytes())?;
    writer.finish()
}
