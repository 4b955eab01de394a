//! Application run state and error types for airsense

use thiserror_no_std::Error;

use crate::sensors::{SensorError, SensorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    Uninitialized,
    SensorsStarting,
    WifiConnecting,
    Running,
    Error,
}

/// Fatal failure of the one-time setup phase.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupError {
    #[error("{sensor} not found after {attempts} attempts: {last_error}")]
    SensorNotFound {
        sensor: SensorKind,
        attempts: u8,
        last_error: SensorError,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Setup failed: {0}")]
    Setup(SetupError),
    #[error("WiFi connection failed: {0}")]
    Wifi(heapless::String<64>),
    #[error("Sensor error: {0}")]
    Sensor(SensorError),
    #[error("Storage error: {0}")]
    Storage(heapless::String<64>),
}

impl From<SetupError> for AppError {
    fn from(e: SetupError) -> Self {
        Self::Setup(e)
    }
}

impl From<SensorError> for AppError {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

/// Short `Debug` rendering of `value` for error payloads. Long values are cut
/// off.
pub fn error_details<T: core::fmt::Debug>(value: &T) -> heapless::String<64> {
    use core::fmt::Write;

    let mut details = heapless::String::new();
    let _ = write!(details, "{:?}", value);
    details
}
