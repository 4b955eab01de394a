//! Desktop simulator for the airsense monitoring station.
//!
//! Runs the real station loop from `airsense-core` against emulated
//! hardware: a DHT20 and an SGP30 on a shared I2C bus, a synthetic
//! microphone and photoresistor, three status LEDs, a logging HTTP client
//! and an in-memory credential store.
//!
//! Time is virtual unless `--realtime` is given, so a simulated hour takes
//! a moment. The last frame of the display is written to a PNG. With the
//! `window` feature the display is also shown live in an SDL2 window.
//!
//! # Environment
//!
//! | Variable               | Store key     |
//! |------------------------|---------------|
//! | `AIRSENSE_SSID`        | `ssid`        |
//! | `AIRSENSE_PASSWORD`    | `password`    |
//! | `AIRSENSE_AUTH_HEADER` | `auth_header` |
//!
//! Without an SSID the station keeps running offline and skips uploads.

mod emulated;
mod services;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::{OutputSettingsBuilder, SimulatorDisplay};
use log::info;

use airsense_core::alerts::StatusLeds;
use airsense_core::async_i2c_bus::SharedI2cDevice;
use airsense_core::config::StationConfig;
use airsense_core::display_manager::{DISPLAY_HEIGHT_PX, DISPLAY_WIDTH_PX, DisplayManager};
use airsense_core::sensors::{Dht20Sensor, Max9814Sensor, PhotoresistorSensor, Sgp30Sensor};
use airsense_core::station::{SensorSuite, Station};

use crate::emulated::{EmulatedBus, IndicatorPin, SimClock, SyntheticLight, SyntheticMic};
use crate::services::{LoggingNetwork, MemoryStore};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Pixel scale factor for the saved frame and the window.
const OUTPUT_SCALE: u32 = 2;

#[derive(Parser, Debug)]
#[command(name = "airsense-simulator", version, about)]
struct Cli {
    /// Number of loop ticks to run
    #[arg(short, long, default_value_t = 60)]
    ticks: u32,

    /// TOML file overriding the default station configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to save the last display frame
    #[arg(short, long, default_value = "airsense-frame.png")]
    frame: PathBuf,

    /// Sleep through every delay instead of advancing a virtual clock
    #[arg(long)]
    realtime: bool,
}

fn load_config(path: Option<&Path>) -> Result<StationConfig> {
    let Some(path) = path else {
        return Ok(StationConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    info!("Starting airsense simulator");
    info!(
        "Tick every {} ms, upload every {} ms to {}",
        config.tick_interval_ms, config.upload.interval_ms, config.upload.url
    );

    let clock = SimClock::new(cli.realtime);
    let bus: Mutex<NoopRawMutex, _> = Mutex::new(EmulatedBus::new(clock.clone()));

    let mut sound = Max9814Sensor::new(SyntheticMic::new(clock.clone()), clock.delay());
    let mut light = PhotoresistorSensor::new(SyntheticLight::new(clock.clone()), clock.delay());
    config.calibration.apply(&mut sound, &mut light);

    let sensors = SensorSuite {
        climate: Dht20Sensor::new(SharedI2cDevice::new(&bus), clock.delay()),
        air: Sgp30Sensor::new(SharedI2cDevice::new(&bus), clock.delay()),
        sound,
        light,
    };

    let panel = SimulatorDisplay::<Rgb565>::new(Size::new(
        u32::from(DISPLAY_WIDTH_PX),
        u32::from(DISPLAY_HEIGHT_PX),
    ));
    let pins = [
        IndicatorPin::new("green"),
        IndicatorPin::new("yellow"),
        IndicatorPin::new("red"),
    ];
    let [green, yellow, red] = pins.clone();

    let mut station = Station::new(
        config,
        sensors,
        DisplayManager::new(panel),
        StatusLeds::new(green, yellow, red),
        LoggingNetwork::default(),
        MemoryStore::from_env(),
    );

    let mut delay = clock.delay();
    block_on(station.setup(&mut delay)).map_err(|e| anyhow!("station setup failed: {e}"))?;

    let output_settings = OutputSettingsBuilder::new().scale(OUTPUT_SCALE).build();

    #[cfg(feature = "window")]
    let mut window = {
        let mut window =
            embedded_graphics_simulator::Window::new("airsense simulator", &output_settings);
        // The SDL window must be updated once before events are polled.
        window.update(station.display().target());
        window
    };

    #[cfg(feature = "window")]
    for _ in 0..cli.ticks {
        block_on(station.run_ticks(1, || clock.now_ms(), &mut delay));

        window.update(station.display().target());
        if window
            .events()
            .any(|event| matches!(event, embedded_graphics_simulator::SimulatorEvent::Quit))
        {
            break;
        }
    }

    #[cfg(not(feature = "window"))]
    block_on(station.run_ticks(cli.ticks, || clock.now_ms(), &mut delay));

    station
        .display()
        .target()
        .to_rgb_output_image(&output_settings)
        .save_png(&cli.frame)
        .with_context(|| format!("failed to save {}", cli.frame.display()))?;

    let lit: Vec<&str> = pins
        .iter()
        .filter(|pin| pin.is_lit())
        .map(IndicatorPin::name)
        .collect();
    info!(
        "Simulated {} s, {} uploads, LED {}, frame saved to {}",
        clock.now_ms() / 1000,
        station.network().uploads(),
        lit.join("+"),
        cli.frame.display()
    );
    Ok(())
}
