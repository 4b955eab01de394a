//! Sensor contract and drivers
//!
//! Every physical sensor on the station implements [`Sensor`]: it is started
//! once with [`Sensor::begin`], sampled once per loop tick with
//! [`Sensor::measure`], and reports its latest readings to the log and to the
//! display. The set of sensors is closed and known at compile time, see
//! [`SensorKind`].

pub mod crc;
pub mod dht20;
pub mod max9814;
pub mod oneshot;
pub mod photoresistor;
pub mod sgp30;

use core::fmt;

use thiserror_no_std::Error;

use crate::display_manager::TextSurface;
use crate::metrics::Metric;

pub use dht20::{ClimateReadings, Dht20Sensor};
pub use max9814::{Max9814Sensor, SoundReadings};
pub use oneshot::{AdcReadError, OneShotInput};
pub use photoresistor::{LightLevel, LightReadings, PhotoresistorSensor, ReadingWindow};
pub use sgp30::{AirQualityReadings, IaqBaseline, IaqCalibration, Sgp30Sensor};

/// Vertical distance between two measurement lines on the display.
pub const ROW_HEIGHT: i32 = 30;

/// Left edge of every measurement line on the display.
pub const LEFT_MARGIN: i32 = 5;

/// The four kinds of sensor fitted to the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Combined temperature and relative humidity (DHT20)
    Climate,
    /// eCO2 / TVOC gas sensor (SGP30)
    AirQuality,
    /// Electret microphone with automatic gain (MAX9814)
    Sound,
    /// Photoresistor voltage divider
    Light,
}

impl SensorKind {
    /// Part name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Climate => "DHT20",
            Self::AirQuality => "SGP30",
            Self::Sound => "MAX9814",
            Self::Light => "Photoresistor",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor} used before begin() succeeded")]
    NotInitialized { sensor: &'static str },
    #[error("{sensor} not found: {details}")]
    NotFound {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor} initialization failed: {details}")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor} failed to {operation}: {details}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor} timed out while waiting to {operation}")]
    Timeout {
        sensor: &'static str,
        operation: &'static str,
    },
    #[error("{sensor} sent a frame with a bad checksum during {operation}")]
    Checksum {
        sensor: &'static str,
        operation: &'static str,
    },
    #[error("{sensor} rejected input: {details}")]
    InvalidInput {
        sensor: &'static str,
        details: &'static str,
    },
}

/// Trait for sensor reading data structures.
///
/// `COUNT` is the number of values the sensor contributes to threshold
/// alerting each tick.
pub trait SensorReadings<const COUNT: usize>: Copy {
    /// The alert-relevant metrics in this reading, in display order.
    fn metrics(&self) -> [(Metric, f32); COUNT];
}

/// Lifecycle contract shared by every sensor driver.
pub trait Sensor<const COUNT: usize> {
    /// The type of readings this sensor produces.
    type Readings: SensorReadings<COUNT>;

    /// Which of the station's sensors this is.
    const KIND: SensorKind;

    /// Acquire the hardware and mark the sensor ready.
    fn begin(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Take one measurement and update the derived readings.
    ///
    /// Fails with [`SensorError::NotInitialized`] without touching the
    /// hardware if [`Sensor::begin`] has not succeeded.
    fn measure(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Whether `begin()` has succeeded.
    fn is_ready(&self) -> bool;

    /// The readings from the most recent successful measurement.
    ///
    /// `None` until the first measurement succeeds.
    fn readings(&self) -> Option<Self::Readings>;

    /// Write the current readings to the log.
    fn print_measurements(&self);

    /// Draw the current readings starting at `cursor`, advancing it by
    /// [`ROW_HEIGHT`] per line.
    fn display_measurements<T: TextSurface>(&self, surface: &mut T, cursor: &mut i32);
}

/// A single-channel analog input such as an ADC pin.
pub trait AnalogInput {
    type Error: fmt::Debug;

    /// Sample the input once, returning the raw converter count.
    fn read(&mut self) -> impl Future<Output = Result<u16, Self::Error>>;
}

/// Linearly re-map `x` from `[in_min, in_max]` to `[out_min, out_max]`.
///
/// Inputs outside the source range extrapolate; nothing is clamped.
pub fn map_range(x: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}
