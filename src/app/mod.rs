pub(crate) mod config;
mod storage;

use cardfs::{MountOptions, SdCard, Volume};
use esp_hal::{
    delay::Delay,
    gpio::{Level, Output, OutputConfig},
    spi::{
        master::{Config as SpiConfig, Spi},
        Mode as SpiMode,
    },
    time::Rate,
    timer::timg::TimerGroup,
};
use esp_println::println;

use self::config::{
    LOG_LEVEL, SD_DATA_SPI_RATE_MHZ, SD_INIT_ATTEMPTS, SD_INIT_RETRY_MS, SD_INIT_SPI_RATE_KHZ,
};

pub(crate) fn run() -> ! {
    esp_println::logger::init_logger(LOG_LEVEL);
    let peripherals = esp_hal::init(esp_hal::Config::default());
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let sd_spi_cfg = SpiConfig::default()
        .with_frequency(Rate::from_khz(SD_INIT_SPI_RATE_KHZ))
        .with_mode(SpiMode::_0);
    let sd_spi = match Spi::new(peripherals.SPI2, sd_spi_cfg) {
        Ok(spi) => spi
            .with_sck(peripherals.GPIO14)
            .with_mosi(peripherals.GPIO13)
            .with_miso(peripherals.GPIO12),
        Err(err) => {
            println!("sd: spi init failed err={:?}", err);
            halt_forever();
        }
    };
    let sd_cs = Output::new(peripherals.GPIO15, Level::High, OutputConfig::default());
    let mut card = SdCard::new(sd_spi, sd_cs);

    let delay = Delay::new();
    let mut attempt = 0u8;
    loop {
        attempt += 1;
        match card.init() {
            Ok(()) => break,
            Err(err) if attempt < SD_INIT_ATTEMPTS => {
                println!("sd: init attempt {} failed: {}", attempt, err);
                delay.delay_millis(SD_INIT_RETRY_MS);
            }
            Err(err) => {
                println!("sd: no usable card: {}", err);
                halt_forever();
            }
        }
    }

    let data_cfg = SpiConfig::default()
        .with_frequency(Rate::from_mhz(SD_DATA_SPI_RATE_MHZ))
        .with_mode(SpiMode::_0);
    if let Err(err) = card.spi_mut().apply_config(&data_cfg) {
        println!("sd: keeping init clock, data clock rejected err={:?}", err);
    }

    let volume = match Volume::mount(card, MountOptions::default()) {
        Ok(volume) => volume,
        Err(err) => {
            println!("sd: mount failed: {}", err);
            halt_forever();
        }
    };
    println!(
        "sd: mounted, {} clusters of {} bytes",
        volume.geometry().cluster_count,
        volume.geometry().cluster_bytes()
    );

    let mut executor = esp_rtos::embassy::Executor::new();
    let executor = unsafe { make_static(&mut executor) };
    executor.run(move |spawner| {
        spawner.must_spawn(storage::storage_task(volume));
    });
}

unsafe fn make_static<T>(value: &mut T) -> &'static mut T {
    unsafe { core::mem::transmute(value) }
}

/// Terminal stop, used for storage states the logger cannot recover from.
pub(crate) fn halt_forever() -> ! {
    loop {
        core::hint::spin_loop();
    }
}
