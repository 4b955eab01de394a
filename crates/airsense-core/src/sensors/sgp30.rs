//! SGP30 eCO2 / TVOC gas sensor
//!
//! The SGP30 runs an on-chip dynamic baseline compensation algorithm. It must
//! be sampled about once a second after `IAQ init`, and its baseline can be
//! read out and written back so that a restart does not cost another 12 hour
//! burn-in. Every word on the wire is followed by a CRC-8.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use heapless::{String, Vec};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use super::crc::{decode_word, encode_word};
use super::{LEFT_MARGIN, ROW_HEIGHT, Sensor, SensorError, SensorKind, SensorReadings};
use crate::display_manager::{TextSize, TextSurface};
use crate::metrics::Metric;

const ADDRESS: u8 = 0x58;
const NAME: &str = "SGP30";

const CMD_GET_SERIAL_ID: u16 = 0x3682;
const CMD_GET_FEATURE_SET: u16 = 0x202F;
const CMD_IAQ_INIT: u16 = 0x2003;
const CMD_MEASURE_IAQ: u16 = 0x2008;
const CMD_MEASURE_RAW: u16 = 0x2050;
const CMD_GET_BASELINE: u16 = 0x2015;
const CMD_SET_BASELINE: u16 = 0x201E;
const CMD_SET_HUMIDITY: u16 = 0x2061;

const PRODUCT_TYPE_MASK: u16 = 0xF0;
const PRODUCT_TYPE_SGP30: u16 = 0x0020;

const SERIAL_DELAY_MS: u32 = 1;
const COMMAND_DELAY_MS: u32 = 10;
const MEASURE_IAQ_DELAY_MS: u32 = 12;
const MEASURE_RAW_DELAY_MS: u32 = 25;

/// Largest absolute humidity the compensation register accepts, in mg/m³.
pub const MAX_ABSOLUTE_HUMIDITY: u32 = 256_000;

/// Latest gas readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AirQualityReadings {
    /// Total volatile organic compounds in ppb
    pub tvoc: u16,
    /// Equivalent CO2 in ppm
    pub eco2: u16,
    pub raw_h2: u16,
    pub raw_ethanol: u16,
}

impl SensorReadings<2> for AirQualityReadings {
    fn metrics(&self) -> [(Metric, f32); 2] {
        [
            (Metric::Eco2, f32::from(self.eco2)),
            (Metric::Tvoc, f32::from(self.tvoc)),
        ]
    }
}

/// Calibration state of the on-chip baseline algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IaqBaseline {
    pub eco2: u16,
    pub tvoc: u16,
}

/// Baseline and humidity compensation for an IAQ gas sensor.
pub trait IaqCalibration {
    /// Read the current baseline from the device.
    fn baseline(&mut self) -> impl Future<Output = Result<IaqBaseline, SensorError>>;

    /// Restore a previously saved baseline.
    fn set_baseline(
        &mut self,
        baseline: IaqBaseline,
    ) -> impl Future<Output = Result<(), SensorError>>;

    /// Compensate for the given absolute humidity in mg/m³. Zero disables
    /// compensation.
    fn set_humidity(&mut self, absolute_mg_m3: u32)
    -> impl Future<Output = Result<(), SensorError>>;
}

/// Absolute humidity in mg/m³ from temperature (°C) and relative humidity (%).
pub fn absolute_humidity_mg_m3(temperature_c: f32, humidity: f32) -> u32 {
    let saturation =
        6.112 * libm::expf(17.62 * temperature_c / (243.12 + temperature_c));
    let grams = 216.7 * ((humidity / 100.0) * saturation / (273.15 + temperature_c));
    (grams * 1000.0) as u32
}

/// Fixed-point value the humidity compensation register expects (8.8 g/m³).
fn humidity_register(absolute_mg_m3: u32) -> u16 {
    ((u64::from(absolute_mg_m3) * 256 * 16777) >> 24) as u16
}

pub struct Sgp30Sensor<I, D> {
    i2c: I,
    delay: D,
    ready: bool,
    serial: u64,
    iaq: Option<(u16, u16)>,
    raw: Option<(u16, u16)>,
}

impl<I: I2c, D: DelayNs> Sgp30Sensor<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            ready: false,
            serial: 0,
            iaq: None,
            raw: None,
        }
    }

    /// 48-bit serial number read during `begin`.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    async fn command(
        &mut self,
        command: u16,
        args: &[u16],
        operation: &'static str,
    ) -> Result<(), SensorError> {
        let mut frame: Vec<u8, 8> = Vec::new();
        let _ = frame.extend_from_slice(&command.to_be_bytes());
        for arg in args {
            let _ = frame.extend_from_slice(&encode_word(*arg));
        }

        self.i2c.write(ADDRESS, &frame).await.map_err(|e| {
            error!("SGP30 {} failed: {:?}", operation, e);
            SensorError::ReadFailed {
                sensor: NAME,
                operation,
                details: "I2C communication error",
            }
        })
    }

    /// Send `command`, wait `delay_ms` and read `words.len()` checked words.
    async fn read_words(
        &mut self,
        command: u16,
        delay_ms: u32,
        words: &mut [u16],
        operation: &'static str,
    ) -> Result<(), SensorError> {
        self.command(command, &[], operation).await?;
        self.delay.delay_ms(delay_ms).await;

        let mut buf = [0u8; 9];
        let bytes = &mut buf[..words.len() * 3];
        self.i2c.read(ADDRESS, bytes).await.map_err(|e| {
            error!("SGP30 {} read failed: {:?}", operation, e);
            SensorError::ReadFailed {
                sensor: NAME,
                operation,
                details: "I2C communication error",
            }
        })?;

        for (word, chunk) in words.iter_mut().zip(bytes.chunks(3)) {
            *word = decode_word(chunk).ok_or_else(|| {
                error!("SGP30 checksum mismatch during {}", operation);
                SensorError::Checksum {
                    sensor: NAME,
                    operation,
                }
            })?;
        }
        Ok(())
    }

    async fn measure_iaq(&mut self) -> Result<(), SensorError> {
        let mut words = [0u16; 2];
        self.read_words(CMD_MEASURE_IAQ, MEASURE_IAQ_DELAY_MS, &mut words, "measure IAQ")
            .await?;
        self.iaq = Some((words[0], words[1]));
        Ok(())
    }

    async fn measure_raw(&mut self) -> Result<(), SensorError> {
        let mut words = [0u16; 2];
        self.read_words(CMD_MEASURE_RAW, MEASURE_RAW_DELAY_MS, &mut words, "measure raw signals")
            .await?;
        self.raw = Some((words[0], words[1]));
        Ok(())
    }

    fn ensure_ready(&self) -> Result<(), SensorError> {
        if self.ready {
            Ok(())
        } else {
            Err(SensorError::NotInitialized { sensor: NAME })
        }
    }
}

impl<I: I2c, D: DelayNs> Sensor<2> for Sgp30Sensor<I, D> {
    type Readings = AirQualityReadings;
    const KIND: SensorKind = SensorKind::AirQuality;

    async fn begin(&mut self) -> Result<(), SensorError> {
        self.ready = false;

        let mut serial = [0u16; 3];
        self.read_words(CMD_GET_SERIAL_ID, SERIAL_DELAY_MS, &mut serial, "read serial id")
            .await
            .map_err(|e| {
                debug!("SGP30 serial id read failed: {:?}", e);
                SensorError::NotFound {
                    sensor: NAME,
                    details: "no valid serial id at address 0x58",
                }
            })?;
        self.serial = serial
            .iter()
            .fold(0u64, |acc, word| (acc << 16) | u64::from(*word));
        info!("SGP30 serial #{:012X}", self.serial);

        let mut feature_set = [0u16; 1];
        self.read_words(
            CMD_GET_FEATURE_SET,
            COMMAND_DELAY_MS,
            &mut feature_set,
            "read feature set",
        )
        .await?;
        if feature_set[0] & PRODUCT_TYPE_MASK != PRODUCT_TYPE_SGP30 {
            error!("SGP30 unexpected feature set {:#06X}", feature_set[0]);
            return Err(SensorError::InitializationFailed {
                sensor: NAME,
                details: "unexpected product type",
            });
        }

        self.command(CMD_IAQ_INIT, &[], "initialize IAQ algorithm")
            .await?;
        self.delay.delay_ms(COMMAND_DELAY_MS).await;

        self.ready = true;
        Ok(())
    }

    async fn measure(&mut self) -> Result<(), SensorError> {
        self.ensure_ready()?;

        // Both sub-measurements always run; each keeps its values on success.
        let iaq = self.measure_iaq().await;
        let raw = self.measure_raw().await;
        iaq.and(raw)
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn readings(&self) -> Option<AirQualityReadings> {
        let (eco2, tvoc) = self.iaq?;
        let (raw_h2, raw_ethanol) = self.raw?;
        Some(AirQualityReadings {
            tvoc,
            eco2,
            raw_h2,
            raw_ethanol,
        })
    }

    fn print_measurements(&self) {
        if let Some(r) = self.readings() {
            info!("TVOC: {} ppb, eCO2: {} ppm", r.tvoc, r.eco2);
            info!("Raw H2: {}, Raw Ethanol: {}", r.raw_h2, r.raw_ethanol);
        }
    }

    fn display_measurements<T: TextSurface>(&self, surface: &mut T, cursor: &mut i32) {
        use core::fmt::Write;

        let Some(r) = self.readings() else {
            return;
        };

        let mut line: String<24> = String::new();
        let _ = write!(line, "TVOC: {} ppb", r.tvoc);
        surface.draw_text(&line, LEFT_MARGIN, *cursor, TextSize::Medium);
        *cursor += ROW_HEIGHT;

        line.clear();
        let _ = write!(line, "eCO2: {} ppm", r.eco2);
        surface.draw_text(&line, LEFT_MARGIN, *cursor, TextSize::Medium);
        *cursor += ROW_HEIGHT;
    }
}

impl<I: I2c, D: DelayNs> IaqCalibration for Sgp30Sensor<I, D> {
    async fn baseline(&mut self) -> Result<IaqBaseline, SensorError> {
        self.ensure_ready()?;
        let mut words = [0u16; 2];
        self.read_words(CMD_GET_BASELINE, COMMAND_DELAY_MS, &mut words, "read baseline")
            .await?;
        Ok(IaqBaseline {
            eco2: words[0],
            tvoc: words[1],
        })
    }

    async fn set_baseline(&mut self, baseline: IaqBaseline) -> Result<(), SensorError> {
        self.ensure_ready()?;
        // The device expects TVOC first.
        self.command(
            CMD_SET_BASELINE,
            &[baseline.tvoc, baseline.eco2],
            "write baseline",
        )
        .await?;
        self.delay.delay_ms(COMMAND_DELAY_MS).await;
        Ok(())
    }

    async fn set_humidity(&mut self, absolute_mg_m3: u32) -> Result<(), SensorError> {
        self.ensure_ready()?;
        if absolute_mg_m3 > MAX_ABSOLUTE_HUMIDITY {
            return Err(SensorError::InvalidInput {
                sensor: NAME,
                details: "absolute humidity above 256 g/m3",
            });
        }

        self.command(
            CMD_SET_HUMIDITY,
            &[humidity_register(absolute_mg_m3)],
            "write humidity compensation",
        )
        .await?;
        self.delay.delay_ms(COMMAND_DELAY_MS).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CountingDelay, RecordingSurface, ScriptedI2c};
    use alloc::vec;
    use embassy_futures::block_on;

    fn started() -> (Sgp30Sensor<ScriptedI2c, CountingDelay>, ScriptedI2c) {
        let bus = ScriptedI2c::new();
        bus.queue_words(&[0x0000, 0x0148, 0x2C1E]);
        bus.queue_words(&[0x0022]);
        let mut sensor = Sgp30Sensor::new(bus.clone(), CountingDelay::new());
        block_on(sensor.begin()).unwrap();
        (sensor, bus)
    }

    #[test]
    fn test_begin_reads_serial_and_starts_algorithm() {
        let (sensor, bus) = started();
        assert!(sensor.is_ready());
        assert_eq!(sensor.serial(), 0x0000_0148_2C1E);
        assert_eq!(
            bus.written(),
            [vec![0x36, 0x82], vec![0x20, 0x2F], vec![0x20, 0x03]]
        );
    }

    #[test]
    fn test_begin_without_device_is_not_found() {
        let bus = ScriptedI2c::new();
        bus.fail_writes(true);
        let mut sensor = Sgp30Sensor::new(bus, CountingDelay::new());

        assert!(matches!(
            block_on(sensor.begin()),
            Err(SensorError::NotFound { sensor: "SGP30", .. })
        ));
    }

    #[test]
    fn test_begin_rejects_other_product() {
        let bus = ScriptedI2c::new();
        bus.queue_words(&[1, 2, 3]);
        bus.queue_words(&[0x0010]);
        let mut sensor = Sgp30Sensor::new(bus, CountingDelay::new());

        assert!(matches!(
            block_on(sensor.begin()),
            Err(SensorError::InitializationFailed { .. })
        ));
        assert!(!sensor.is_ready());
    }

    #[test]
    fn test_measure_before_begin() {
        let bus = ScriptedI2c::new();
        let mut sensor = Sgp30Sensor::new(bus.clone(), CountingDelay::new());
        assert_eq!(
            block_on(sensor.measure()),
            Err(SensorError::NotInitialized { sensor: "SGP30" })
        );
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn test_measure_reads_both_signals() {
        let (mut sensor, bus) = started();
        bus.queue_words(&[410, 120]);
        bus.queue_words(&[13000, 18500]);

        block_on(sensor.measure()).unwrap();

        assert_eq!(
            sensor.readings(),
            Some(AirQualityReadings {
                tvoc: 120,
                eco2: 410,
                raw_h2: 13000,
                raw_ethanol: 18500,
            })
        );
    }

    #[test]
    fn test_failed_iaq_still_attempts_raw() {
        let (mut sensor, bus) = started();
        bus.queue_words(&[410, 120]);
        bus.queue_words(&[13000, 18500]);
        block_on(sensor.measure()).unwrap();

        bus.queue_read_error();
        bus.queue_words(&[13100, 18600]);

        assert!(block_on(sensor.measure()).is_err());
        assert_eq!(bus.pending_reads(), 0);

        let r = sensor.readings().unwrap();
        assert_eq!((r.eco2, r.tvoc), (410, 120));
        assert_eq!((r.raw_h2, r.raw_ethanol), (13100, 18600));
    }

    #[test]
    fn test_readings_need_both_halves() {
        let (mut sensor, bus) = started();
        bus.queue_words(&[410, 120]);
        bus.queue_read_error();

        assert!(block_on(sensor.measure()).is_err());
        assert!(sensor.readings().is_none());
    }

    #[test]
    fn test_corrupted_word_is_checksum_error() {
        let (mut sensor, bus) = started();
        let mut bytes = vec![];
        bytes.extend_from_slice(&encode_word(410));
        bytes.extend_from_slice(&[0x00, 0x78, 0x00]);
        bus.queue_read(&bytes);
        bus.queue_words(&[13000, 18500]);

        assert_eq!(
            block_on(sensor.measure()),
            Err(SensorError::Checksum {
                sensor: "SGP30",
                operation: "measure IAQ"
            })
        );
    }

    #[test]
    fn test_baseline_round_trip_on_the_wire() {
        let (mut sensor, bus) = started();
        bus.queue_words(&[0x8F3E, 0x9124]);

        let baseline = block_on(sensor.baseline()).unwrap();
        assert_eq!(
            baseline,
            IaqBaseline {
                eco2: 0x8F3E,
                tvoc: 0x9124
            }
        );

        block_on(sensor.set_baseline(baseline)).unwrap();
        let mut expected = vec![0x20, 0x1E];
        expected.extend_from_slice(&encode_word(0x9124));
        expected.extend_from_slice(&encode_word(0x8F3E));
        assert_eq!(bus.written().last().unwrap(), &expected);
    }

    #[test]
    fn test_humidity_register_scaling() {
        assert_eq!(humidity_register(11_000), 2815);
        assert_eq!(humidity_register(0), 0);
    }

    #[test]
    fn test_set_humidity_rejects_out_of_range() {
        let (mut sensor, bus) = started();
        let writes = bus.writes().len();

        assert!(matches!(
            block_on(sensor.set_humidity(MAX_ABSOLUTE_HUMIDITY + 1)),
            Err(SensorError::InvalidInput { .. })
        ));
        assert_eq!(bus.writes().len(), writes);

        block_on(sensor.set_humidity(11_000)).unwrap();
        let mut expected = vec![0x20, 0x61];
        expected.extend_from_slice(&encode_word(2815));
        assert_eq!(bus.written().last().unwrap(), &expected);
    }

    #[test]
    fn test_absolute_humidity() {
        let ah = absolute_humidity_mg_m3(25.0, 50.0);
        assert!((11_400..11_600).contains(&ah), "got {}", ah);
        assert_eq!(absolute_humidity_mg_m3(25.0, 0.0), 0);
    }

    #[test]
    fn test_display_lines() {
        let (mut sensor, bus) = started();
        bus.queue_words(&[410, 120]);
        bus.queue_words(&[13000, 18500]);
        block_on(sensor.measure()).unwrap();

        let mut surface = RecordingSurface::default();
        let mut cursor = 0;
        sensor.display_measurements(&mut surface, &mut cursor);

        assert_eq!(surface.lines(), ["TVOC: 120 ppb", "eCO2: 410 ppm"]);
        assert_eq!(cursor, 2 * ROW_HEIGHT);
    }
}
