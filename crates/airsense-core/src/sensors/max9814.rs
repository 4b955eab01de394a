//! MAX9814 electret microphone amplifier
//!
//! The amplifier output idles at mid-supply. A measurement takes a burst of
//! samples, averages their distance from that midpoint and maps the result
//! linearly onto a decibel range.

use embedded_hal_async::delay::DelayNs;
use heapless::String;
use log::{error, info};

use super::{
    AnalogInput, LEFT_MARGIN, ROW_HEIGHT, Sensor, SensorError, SensorKind, SensorReadings,
    map_range,
};
use crate::display_manager::{TextSize, TextSurface};
use crate::metrics::Metric;

const NAME: &str = "MAX9814";

/// Samples averaged per measurement.
pub const SAMPLE_COUNT: usize = 100;

/// Converter count of the amplifier's quiescent output.
pub const DC_OFFSET: u16 = 512;

const SAMPLE_INTERVAL_MS: u32 = 1;

/// Full-scale count of the analog converter.
#[cfg(feature = "adc-12bit")]
pub const ADC_MAX: u16 = 4095;
#[cfg(not(feature = "adc-12bit"))]
pub const ADC_MAX: u16 = 1023;

pub const DEFAULT_DB_MIN: f32 = 48.0;
pub const DEFAULT_DB_MAX: f32 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundReadings {
    pub decibels: f32,
    /// Mean absolute deviation from [`DC_OFFSET`], in converter counts
    pub average: f32,
}

impl SensorReadings<1> for SoundReadings {
    fn metrics(&self) -> [(Metric, f32); 1] {
        [(Metric::Noise, self.decibels)]
    }
}

pub struct Max9814Sensor<A, D> {
    adc: A,
    delay: D,
    db_min: f32,
    db_max: f32,
    ready: bool,
    readings: Option<SoundReadings>,
}

impl<A: AnalogInput, D: DelayNs> Max9814Sensor<A, D> {
    pub fn new(adc: A, delay: D) -> Self {
        Self {
            adc,
            delay,
            db_min: DEFAULT_DB_MIN,
            db_max: DEFAULT_DB_MAX,
            ready: false,
            readings: None,
        }
    }

    /// Change the decibel range the averaged amplitude maps onto.
    pub fn set_db_range(&mut self, db_min: f32, db_max: f32) {
        self.db_min = db_min;
        self.db_max = db_max;
    }

    pub fn db_range(&self) -> (f32, f32) {
        (self.db_min, self.db_max)
    }

    /// Map a mean amplitude in converter counts to decibels. Not clamped.
    pub fn decibels_for(&self, average: f32) -> f32 {
        map_range(average, 0.0, f32::from(ADC_MAX), self.db_min, self.db_max)
    }
}

impl<A: AnalogInput, D: DelayNs> Sensor<1> for Max9814Sensor<A, D> {
    type Readings = SoundReadings;
    const KIND: SensorKind = SensorKind::Sound;

    async fn begin(&mut self) -> Result<(), SensorError> {
        self.ready = true;
        Ok(())
    }

    async fn measure(&mut self) -> Result<(), SensorError> {
        if !self.ready {
            return Err(SensorError::NotInitialized { sensor: NAME });
        }

        let mut total: u32 = 0;
        for _ in 0..SAMPLE_COUNT {
            let raw = self.adc.read().await.map_err(|e| {
                error!("MAX9814 ADC read failed: {:?}", e);
                SensorError::ReadFailed {
                    sensor: NAME,
                    operation: "sample microphone",
                    details: "ADC error",
                }
            })?;
            total += u32::from(raw.abs_diff(DC_OFFSET));
            self.delay.delay_ms(SAMPLE_INTERVAL_MS).await;
        }

        let average = total as f32 / SAMPLE_COUNT as f32;
        self.readings = Some(SoundReadings {
            decibels: self.decibels_for(average),
            average,
        });
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn readings(&self) -> Option<SoundReadings> {
        self.readings
    }

    fn print_measurements(&self) {
        if let Some(r) = self.readings {
            info!("Sound: {:.1} dB (amplitude {:.1})", r.decibels, r.average);
        }
    }

    fn display_measurements<T: TextSurface>(&self, surface: &mut T, cursor: &mut i32) {
        use core::fmt::Write;

        let Some(r) = self.readings else {
            return;
        };

        let mut line: String<24> = String::new();
        let _ = write!(line, "Sound: {:.1} dB", r.decibels);
        surface.draw_text(&line, LEFT_MARGIN, *cursor, TextSize::Medium);
        *cursor += ROW_HEIGHT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CountingDelay, FakeAnalog, RecordingSurface};
    use embassy_futures::block_on;

    fn started(adc: FakeAnalog) -> Max9814Sensor<FakeAnalog, CountingDelay> {
        let mut sensor = Max9814Sensor::new(adc, CountingDelay::new());
        block_on(sensor.begin()).unwrap();
        sensor
    }

    #[test]
    fn test_measure_before_begin_does_not_sample() {
        let adc = FakeAnalog::constant(DC_OFFSET);
        let mut sensor = Max9814Sensor::new(adc.clone(), CountingDelay::new());

        assert_eq!(
            block_on(sensor.measure()),
            Err(SensorError::NotInitialized { sensor: "MAX9814" })
        );
        assert_eq!(adc.reads(), 0);
    }

    #[test]
    fn test_silence_maps_to_db_min() {
        let adc = FakeAnalog::constant(DC_OFFSET);
        let delay = CountingDelay::new();
        let mut sensor = Max9814Sensor::new(adc.clone(), delay.clone());
        block_on(sensor.begin()).unwrap();

        block_on(sensor.measure()).unwrap();

        let r = sensor.readings().unwrap();
        assert_eq!(r.average, 0.0);
        assert_eq!(r.decibels, DEFAULT_DB_MIN);
        assert_eq!(adc.reads(), SAMPLE_COUNT);
        assert_eq!(delay.elapsed_ms(), SAMPLE_COUNT as u64);
    }

    #[test]
    fn test_full_scale_maps_to_db_max() {
        let mut sensor = started(FakeAnalog::constant(DC_OFFSET + ADC_MAX));
        block_on(sensor.measure()).unwrap();
        assert_eq!(sensor.readings().unwrap().decibels, DEFAULT_DB_MAX);
    }

    #[test]
    fn test_deviation_is_symmetric_around_offset() {
        let samples: [u16; SAMPLE_COUNT] =
            core::array::from_fn(|i| if i % 2 == 0 { DC_OFFSET - 100 } else { DC_OFFSET + 100 });
        let mut sensor = started(FakeAnalog::sequence(&samples));

        block_on(sensor.measure()).unwrap();
        assert_eq!(sensor.readings().unwrap().average, 100.0);
    }

    #[test]
    fn test_average_keeps_fraction() {
        // 99 quiet samples and one 50 counts away
        let mut samples = [DC_OFFSET; SAMPLE_COUNT];
        samples[0] = DC_OFFSET + 50;
        let mut sensor = started(FakeAnalog::sequence(&samples));

        block_on(sensor.measure()).unwrap();
        assert_eq!(sensor.readings().unwrap().average, 0.5);
    }

    #[test]
    fn test_out_of_range_overshoots() {
        let sensor = started(FakeAnalog::constant(DC_OFFSET));
        let beyond = sensor.decibels_for(2.0 * f32::from(ADC_MAX));
        assert!(beyond > DEFAULT_DB_MAX);
    }

    #[test]
    fn test_mapping_is_monotonic() {
        let sensor = started(FakeAnalog::constant(DC_OFFSET));
        let mut previous = f32::MIN;
        for avg in (0..=ADC_MAX).step_by(7) {
            let db = sensor.decibels_for(f32::from(avg));
            assert!(db >= previous);
            previous = db;
        }
    }

    #[test]
    fn test_set_db_range() {
        let mut sensor = started(FakeAnalog::constant(DC_OFFSET));
        sensor.set_db_range(35.0, 80.0);
        assert_eq!(sensor.db_range(), (35.0, 80.0));

        block_on(sensor.measure()).unwrap();
        assert_eq!(sensor.readings().unwrap().decibels, 35.0);
    }

    #[test]
    fn test_adc_failure_keeps_previous_readings() {
        let adc = FakeAnalog::constant(DC_OFFSET);
        let mut sensor = started(adc.clone());
        block_on(sensor.measure()).unwrap();

        adc.set_fallback(None);
        assert!(matches!(
            block_on(sensor.measure()),
            Err(SensorError::ReadFailed { .. })
        ));
        assert_eq!(sensor.readings().unwrap().decibels, DEFAULT_DB_MIN);
    }

    #[test]
    fn test_display_line() {
        let mut sensor = started(FakeAnalog::constant(DC_OFFSET));
        block_on(sensor.measure()).unwrap();

        let mut surface = RecordingSurface::default();
        let mut cursor = 0;
        sensor.display_measurements(&mut surface, &mut cursor);

        assert_eq!(surface.lines(), ["Sound: 48.0 dB"]);
        assert_eq!(cursor, ROW_HEIGHT);
    }
}
