//! Hardware initialization for the airsense station
//!
//! Each function takes ownership of the peripherals it needs and returns a
//! driver-ready handle, so `main` reads as a wiring list.

use airsense_core::alerts::StatusLeds;
use airsense_core::async_i2c_bus::SharedI2cDevice;
use airsense_core::display_manager::{DISPLAY_HEIGHT_PX, DISPLAY_WIDTH_PX};
use airsense_core::sensors::OneShotInput;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};
use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::gpio::{Level, Output, OutputConfig, OutputPin};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::peripherals::{
    ADC1, ADC2, GPIO2, GPIO8, GPIO9, GPIO12, GPIO15, GPIO16, GPIO17, GPIO18, I2C0, SPI2,
};
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::time::Rate;
use log::{error, info};
use mipidsi::interface::SpiInterface;
use mipidsi::models::ST7789;
use mipidsi::options::ColorInversion;
use mipidsi::{Builder as MipidsiBuilder, NoResetPin};
use static_cell::StaticCell;
use thiserror_no_std::Error;

pub type I2cBus = I2c<'static, esp_hal::Async>;
pub type SensorI2c = SharedI2cDevice<'static, NoopRawMutex, I2cBus>;

type DisplaySpi = ExclusiveDevice<Spi<'static, Blocking>, Output<'static>, NoDelay>;

pub type Display =
    mipidsi::Display<SpiInterface<'static, DisplaySpi, Output<'static>>, ST7789, NoResetPin>;

pub type Leds = StatusLeds<Output<'static>, Output<'static>, Output<'static>>;

/// Bytes batched per SPI transfer. Larger is faster and costs RAM.
const SPI_BUFFER_SIZE: usize = 512;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareError {
    #[error("I2C bus configuration rejected")]
    I2c,
    #[error("SPI bus configuration rejected")]
    Spi,
    #[error("display did not initialize")]
    Display,
}

/// Create the async I2C bus that the DHT20 and the SGP30 share.
pub fn create_i2c_bus(
    i2c0: I2C0<'static>,
    sda: GPIO8<'static>,
    scl: GPIO9<'static>,
) -> Result<I2cBus, HardwareError> {
    let bus = I2c::new(i2c0, I2cConfig::default().with_frequency(Rate::from_khz(100)))
        .map_err(|e| {
            error!("I2C config error: {:?}", e);
            HardwareError::I2c
        })?
        .with_sda(sda)
        .with_scl(scl)
        .into_async();
    Ok(bus)
}

/// Put `bus` behind a mutex and hand out one device per I2C sensor.
pub fn share_i2c_bus(bus: I2cBus) -> (SensorI2c, SensorI2c) {
    static I2C0_BUS: StaticCell<Mutex<NoopRawMutex, I2cBus>> = StaticCell::new();
    let bus = I2C0_BUS.init(Mutex::new(bus));

    (SharedI2cDevice::new(bus), SharedI2cDevice::new(bus))
}

/// Microphone amplifier output on ADC1, GPIO2.
pub fn microphone(
    adc1: ADC1<'static>,
    pin: GPIO2<'static>,
) -> OneShotInput<impl FnMut() -> nb::Result<u16, ()>> {
    let mut config = AdcConfig::new();
    let mut pin = config.enable_pin(pin, Attenuation::_11dB);
    let mut adc = Adc::new(adc1, config);
    OneShotInput::new("ADC1/GPIO2", move || adc.read_oneshot(&mut pin))
}

/// Photoresistor divider on ADC2, GPIO12.
///
/// The ESP32-S3 radio also uses ADC2. One-shot reads can fail while WiFi is
/// transmitting, and a tick without a light reading skips that upload.
pub fn photoresistor(
    adc2: ADC2<'static>,
    pin: GPIO12<'static>,
) -> OneShotInput<impl FnMut() -> nb::Result<u16, ()>> {
    let mut config = AdcConfig::new();
    let mut pin = config.enable_pin(pin, Attenuation::_11dB);
    let mut adc = Adc::new(adc2, config);
    OneShotInput::new("ADC2/GPIO12", move || adc.read_oneshot(&mut pin))
}

/// Green, yellow and red alert LEDs, all off.
pub fn status_leds(
    green: impl OutputPin + 'static,
    yellow: impl OutputPin + 'static,
    red: impl OutputPin + 'static,
) -> Leds {
    let off = OutputConfig::default();
    StatusLeds::new(
        Output::new(green, Level::Low, off),
        Output::new(yellow, Level::Low, off),
        Output::new(red, Level::Low, off),
    )
}

/// Bring up the ST7789 panel in portrait orientation.
pub fn init_display(
    spi2: SPI2<'static>,
    sck: GPIO18<'static>,
    mosi: GPIO17<'static>,
    cs: GPIO16<'static>,
    dc: GPIO15<'static>,
) -> Result<Display, HardwareError> {
    static SPI_BUFFER: StaticCell<[u8; SPI_BUFFER_SIZE]> = StaticCell::new();

    let spi_bus = Spi::new(spi2, SpiConfig::default().with_frequency(Rate::from_mhz(40)))
        .map_err(|e| {
            error!("SPI config error: {:?}", e);
            HardwareError::Spi
        })?
        .with_sck(sck)
        .with_mosi(mosi);

    // CS is a plain GPIO, not the hardware chip select.
    let cs = Output::new(cs, Level::High, OutputConfig::default());
    let Ok(spi_device) = ExclusiveDevice::new_no_delay(spi_bus, cs);

    let dc = Output::new(dc, Level::Low, OutputConfig::default());
    let interface = SpiInterface::new(spi_device, dc, SPI_BUFFER.init([0; SPI_BUFFER_SIZE]));

    let display = MipidsiBuilder::new(ST7789, interface)
        .display_size(DISPLAY_WIDTH_PX, DISPLAY_HEIGHT_PX)
        .invert_colors(ColorInversion::Inverted)
        .init(&mut embassy_time::Delay)
        .map_err(|e| {
            error!("Display init error: {:?}", e);
            HardwareError::Display
        })?;

    info!("Display initialized");
    Ok(display)
}
