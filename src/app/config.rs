use log::LevelFilter;

pub(crate) const LOG_LEVEL: LevelFilter = LevelFilter::Info;

pub(crate) const SD_INIT_SPI_RATE_KHZ: u32 = 400;
pub(crate) const SD_DATA_SPI_RATE_MHZ: u32 = 24;
pub(crate) const SD_INIT_ATTEMPTS: u8 = 3;
pub(crate) const SD_INIT_RETRY_MS: u32 = 250;

/// Per-session log, created inside the numbered session directory.
pub(crate) const LOG_FILE_NAME: &str = "UPTIME.CSV";
pub(crate) const LOG_INTERVAL_SECONDS: u64 = 60;
pub(crate) const LOG_LINE_LEN: usize = 32;
