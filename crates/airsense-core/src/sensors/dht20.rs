//! DHT20 (AHT20 core) temperature and relative humidity sensor

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use heapless::String;
use log::{debug, error, info};

use super::crc::crc8;
use super::{LEFT_MARGIN, ROW_HEIGHT, Sensor, SensorError, SensorKind, SensorReadings};
use crate::display_manager::{TextSize, TextSurface};
use crate::metrics::Metric;

const ADDRESS: u8 = 0x38;
const NAME: &str = "DHT20";

const CMD_SOFT_RESET: [u8; 1] = [0xBA];
const CMD_CALIBRATE: [u8; 3] = [0xBE, 0x08, 0x00];
const CMD_TRIGGER: [u8; 3] = [0xAC, 0x33, 0x00];

const STATUS_BUSY: u8 = 0x80;
const STATUS_CALIBRATED: u8 = 0x08;

const POWER_ON_DELAY_MS: u32 = 20;
const RESET_DELAY_MS: u32 = 20;
const CALIBRATE_DELAY_MS: u32 = 10;
const MEASUREMENT_DELAY_MS: u32 = 80;
const BUSY_POLL_INTERVAL_MS: u32 = 10;
const BUSY_POLL_LIMIT: u8 = 10;

/// 2^20, the full scale of both raw channels.
const RAW_FULL_SCALE: f32 = 1_048_576.0;

/// One combined temperature and humidity sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReadings {
    pub temperature_c: f32,
    pub temperature_f: f32,
    /// Relative humidity in %
    pub humidity: f32,
}

impl SensorReadings<2> for ClimateReadings {
    fn metrics(&self) -> [(Metric, f32); 2] {
        [
            (Metric::Temperature, self.temperature_c),
            (Metric::Humidity, self.humidity),
        ]
    }
}

pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Decode a 7-byte measurement frame (status, 5 data bytes, CRC).
fn decode_frame(frame: &[u8; 7]) -> ClimateReadings {
    let raw_humidity =
        (u32::from(frame[1]) << 12) | (u32::from(frame[2]) << 4) | (u32::from(frame[3]) >> 4);
    let raw_temperature =
        ((u32::from(frame[3]) & 0x0F) << 16) | (u32::from(frame[4]) << 8) | u32::from(frame[5]);

    let humidity = raw_humidity as f32 * 100.0 / RAW_FULL_SCALE;
    let temperature_c = raw_temperature as f32 * 200.0 / RAW_FULL_SCALE - 50.0;

    ClimateReadings {
        temperature_c,
        temperature_f: celsius_to_fahrenheit(temperature_c),
        humidity,
    }
}

pub struct Dht20Sensor<I, D> {
    i2c: I,
    delay: D,
    ready: bool,
    readings: Option<ClimateReadings>,
}

impl<I: I2c, D: DelayNs> Dht20Sensor<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            ready: false,
            readings: None,
        }
    }

    async fn read_status(&mut self) -> Result<u8, SensorError> {
        let mut status = [0u8; 1];
        self.i2c.read(ADDRESS, &mut status).await.map_err(|e| {
            error!("DHT20 status read failed: {:?}", e);
            SensorError::ReadFailed {
                sensor: NAME,
                operation: "read status",
                details: "I2C communication error",
            }
        })?;
        Ok(status[0])
    }

    /// Poll the status byte until the busy flag clears.
    async fn wait_idle(&mut self, operation: &'static str) -> Result<u8, SensorError> {
        for _ in 0..BUSY_POLL_LIMIT {
            let status = self.read_status().await?;
            if status & STATUS_BUSY == 0 {
                return Ok(status);
            }
            self.delay.delay_ms(BUSY_POLL_INTERVAL_MS).await;
        }

        error!("DHT20 still busy after {} polls", BUSY_POLL_LIMIT);
        Err(SensorError::Timeout {
            sensor: NAME,
            operation,
        })
    }

    async fn send(&mut self, command: &[u8], operation: &'static str) -> Result<(), SensorError> {
        self.i2c.write(ADDRESS, command).await.map_err(|e| {
            error!("DHT20 {} failed: {:?}", operation, e);
            SensorError::ReadFailed {
                sensor: NAME,
                operation,
                details: "I2C communication error",
            }
        })
    }

    /// Read a finished measurement frame, retrying while the sensor reports busy.
    async fn read_frame(&mut self) -> Result<[u8; 7], SensorError> {
        let mut frame = [0u8; 7];
        for _ in 0..BUSY_POLL_LIMIT {
            self.i2c.read(ADDRESS, &mut frame).await.map_err(|e| {
                error!("DHT20 measurement read failed: {:?}", e);
                SensorError::ReadFailed {
                    sensor: NAME,
                    operation: "read measurement",
                    details: "I2C communication error",
                }
            })?;

            if frame[0] & STATUS_BUSY == 0 {
                return Ok(frame);
            }
            self.delay.delay_ms(BUSY_POLL_INTERVAL_MS).await;
        }

        Err(SensorError::Timeout {
            sensor: NAME,
            operation: "wait for measurement",
        })
    }
}

impl<I: I2c, D: DelayNs> Sensor<2> for Dht20Sensor<I, D> {
    type Readings = ClimateReadings;
    const KIND: SensorKind = SensorKind::Climate;

    async fn begin(&mut self) -> Result<(), SensorError> {
        self.ready = false;
        self.delay.delay_ms(POWER_ON_DELAY_MS).await;

        self.i2c.write(ADDRESS, &CMD_SOFT_RESET).await.map_err(|e| {
            debug!("DHT20 did not acknowledge soft reset: {:?}", e);
            SensorError::NotFound {
                sensor: NAME,
                details: "no acknowledge at address 0x38",
            }
        })?;
        self.delay.delay_ms(RESET_DELAY_MS).await;

        let mut status = self.wait_idle("finish soft reset").await?;
        if status & STATUS_CALIBRATED == 0 {
            info!("DHT20: loading calibration");
            self.send(&CMD_CALIBRATE, "send calibration command").await?;
            self.delay.delay_ms(CALIBRATE_DELAY_MS).await;
            status = self.wait_idle("finish calibration").await?;
        }

        if status & STATUS_CALIBRATED == 0 {
            return Err(SensorError::InitializationFailed {
                sensor: NAME,
                details: "calibration bit not set",
            });
        }

        self.ready = true;
        Ok(())
    }

    async fn measure(&mut self) -> Result<(), SensorError> {
        if !self.ready {
            return Err(SensorError::NotInitialized { sensor: NAME });
        }

        self.send(&CMD_TRIGGER, "trigger measurement").await?;
        self.delay.delay_ms(MEASUREMENT_DELAY_MS).await;

        let frame = self.read_frame().await?;
        if crc8(&frame[..6]) != frame[6] {
            error!("DHT20 frame checksum mismatch");
            return Err(SensorError::Checksum {
                sensor: NAME,
                operation: "read measurement",
            });
        }

        self.readings = Some(decode_frame(&frame));
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn readings(&self) -> Option<ClimateReadings> {
        self.readings
    }

    fn print_measurements(&self) {
        if let Some(r) = self.readings {
            info!(
                "Temperature: {:.1}°C / {:.1}°F, Humidity: {:.1}%",
                r.temperature_c, r.temperature_f, r.humidity
            );
        }
    }

    fn display_measurements<T: TextSurface>(&self, surface: &mut T, cursor: &mut i32) {
        use core::fmt::Write;

        let Some(r) = self.readings else {
            return;
        };

        let mut line: String<32> = String::new();
        let _ = write!(line, "Temp: {:.1}C/{:.1}F", r.temperature_c, r.temperature_f);
        surface.draw_text(&line, LEFT_MARGIN, *cursor, TextSize::Medium);
        *cursor += ROW_HEIGHT;

        line.clear();
        let _ = write!(line, "Humidity: {:.1}%", r.humidity);
        surface.draw_text(&line, LEFT_MARGIN, *cursor, TextSize::Medium);
        *cursor += ROW_HEIGHT;
    }
}
