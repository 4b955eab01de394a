//! Photoresistor light sensor
//!
//! The light-dependent resistor sits in a voltage divider on an ADC pin. The
//! percentage is relative to the darkest and brightest averages seen so far,
//! so it adapts to the room the station is in; the coarse
//! [`LightLevel`] uses fixed raw thresholds instead.

use embedded_hal_async::delay::DelayNs;
use heapless::String;
use log::{error, info};

use super::{
    AnalogInput, LEFT_MARGIN, ROW_HEIGHT, Sensor, SensorError, SensorKind, SensorReadings,
    map_range,
};
use crate::display_manager::{TextSize, TextSurface};
use crate::metrics::Metric;

const NAME: &str = "Photoresistor";

const SAMPLE_COUNT: u32 = 10;
const SAMPLE_INTERVAL_MS: u32 = 2;
const WARMUP_READS: u8 = 5;
const WARMUP_INTERVAL_MS: u32 = 10;

pub const DEFAULT_DARK_THRESHOLD: u16 = 100;
pub const DEFAULT_BRIGHT_THRESHOLD: u16 = 900;

/// Range of raw averages the percentage is computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingWindow {
    /// No reading yet; the next one becomes both bounds.
    Unseeded,
    Seeded { min: u16, max: u16 },
}

impl Default for ReadingWindow {
    fn default() -> Self {
        Self::Seeded { min: 0, max: 50 }
    }
}

impl ReadingWindow {
    /// Grow the window so that it contains `raw`.
    pub fn include(&mut self, raw: u16) {
        *self = match *self {
            Self::Unseeded => Self::Seeded { min: raw, max: raw },
            Self::Seeded { min, max } => Self::Seeded {
                min: min.min(raw),
                max: max.max(raw),
            },
        };
    }

    /// Position of `raw` within the window as 0-100 %.
    ///
    /// An unseeded or zero-width window yields 0.
    pub fn percent(&self, raw: u16) -> f32 {
        match *self {
            Self::Seeded { min, max } if min != max => {
                map_range(f32::from(raw), f32::from(min), f32::from(max), 0.0, 100.0)
            }
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightLevel {
    Dark,
    Dim,
    Bright,
}

impl LightLevel {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dark => "Dark",
            Self::Dim => "Dim",
            Self::Bright => "Bright",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightReadings {
    /// Averaged converter count
    pub raw: u16,
    pub percent: f32,
    pub level: LightLevel,
}

impl SensorReadings<1> for LightReadings {
    fn metrics(&self) -> [(Metric, f32); 1] {
        [(Metric::Light, self.percent)]
    }
}

pub struct PhotoresistorSensor<A, D> {
    adc: A,
    delay: D,
    window: ReadingWindow,
    dark_threshold: u16,
    bright_threshold: u16,
    ready: bool,
    readings: Option<LightReadings>,
}

impl<A: AnalogInput, D: DelayNs> PhotoresistorSensor<A, D> {
    pub fn new(adc: A, delay: D) -> Self {
        Self {
            adc,
            delay,
            window: ReadingWindow::default(),
            dark_threshold: DEFAULT_DARK_THRESHOLD,
            bright_threshold: DEFAULT_BRIGHT_THRESHOLD,
            ready: false,
            readings: None,
        }
    }

    /// Raw counts at or below `dark` read as dark, at or above `bright` as bright.
    pub fn set_thresholds(&mut self, dark: u16, bright: u16) {
        self.dark_threshold = dark;
        self.bright_threshold = bright;
    }

    /// Forget the observed range. The next measurement seeds it again.
    pub fn reset_min_max(&mut self) {
        self.window = ReadingWindow::Unseeded;
    }

    pub fn window(&self) -> ReadingWindow {
        self.window
    }

    pub fn classify(&self, raw: u16) -> LightLevel {
        if raw <= self.dark_threshold {
            LightLevel::Dark
        } else if raw >= self.bright_threshold {
            LightLevel::Bright
        } else {
            LightLevel::Dim
        }
    }

    async fn sample(&mut self) -> Result<u16, SensorError> {
        self.adc.read().await.map_err(|e| {
            error!("Photoresistor ADC read failed: {:?}", e);
            SensorError::ReadFailed {
                sensor: NAME,
                operation: "sample light level",
                details: "ADC error",
            }
        })
    }
}

impl<A: AnalogInput, D: DelayNs> Sensor<1> for PhotoresistorSensor<A, D> {
    type Readings = LightReadings;
    const KIND: SensorKind = SensorKind::Light;

    async fn begin(&mut self) -> Result<(), SensorError> {
        // Let the divider settle; the first conversions are discarded.
        for _ in 0..WARMUP_READS {
            self.sample().await?;
            self.delay.delay_ms(WARMUP_INTERVAL_MS).await;
        }
        self.ready = true;
        Ok(())
    }

    async fn measure(&mut self) -> Result<(), SensorError> {
        if !self.ready {
            return Err(SensorError::NotInitialized { sensor: NAME });
        }

        let mut total: u32 = 0;
        for _ in 0..SAMPLE_COUNT {
            total += u32::from(self.sample().await?);
            self.delay.delay_ms(SAMPLE_INTERVAL_MS).await;
        }
        let raw = (total / SAMPLE_COUNT) as u16;

        self.window.include(raw);
        self.readings = Some(LightReadings {
            raw,
            percent: self.window.percent(raw),
            level: self.classify(raw),
        });
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn readings(&self) -> Option<LightReadings> {
        self.readings
    }

    fn print_measurements(&self) {
        if let Some(r) = self.readings {
            info!(
                "Light: {}% ({}, raw {})",
                r.percent as i32,
                r.level.name(),
                r.raw
            );
        }
    }

    fn display_measurements<T: TextSurface>(&self, surface: &mut T, cursor: &mut i32) {
        use core::fmt::Write;

        let Some(r) = self.readings else {
            return;
        };

        let mut line: String<16> = String::new();
        let _ = write!(line, "Light: {}%", r.percent as i32);
        surface.draw_text(&line, LEFT_MARGIN, *cursor, TextSize::Medium);
        *cursor += ROW_HEIGHT;
    }
}
