use embedded_hal_async::delay::DelayNs;
use heapless::String;
use serde::{Deserialize, Serialize};

use crate::sensors::{AnalogInput, Max9814Sensor, PhotoresistorSensor};
use crate::setup::RetryPolicy;

/// Collection endpoint used when no other URL is configured.
pub const DEFAULT_UPLOAD_URL: &str = "http://airsense.local/api/readings";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StationConfig {
    /// Time between two loop ticks
    pub tick_interval_ms: u64,
    pub upload: UploadConfig,
    pub setup: RetryPolicy,
    pub network: NetworkConfig,
    pub calibration: CalibrationConfig,
    /// How often the gas sensor baseline is written to the store
    pub baseline_save_interval_ms: u64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            upload: UploadConfig::default(),
            setup: RetryPolicy::default(),
            network: NetworkConfig::default(),
            calibration: CalibrationConfig::default(),
            baseline_save_interval_ms: 60 * 60 * 1000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    pub url: String<128>,
    pub interval_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        let mut url = String::new();
        let _ = url.push_str(DEFAULT_UPLOAD_URL);
        Self {
            url,
            interval_ms: 15_000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct NetworkConfig {
    pub connect_attempts: u8,
    pub retry_delay_ms: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 10,
            retry_delay_ms: 500,
        }
    }
}

/// Per-installation sensor calibration, applied once at boot.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct CalibrationConfig {
    pub db_min: f32,
    pub db_max: f32,
    /// Raw photoresistor average at or below which the room counts as dark
    pub light_dark: u16,
    /// Raw photoresistor average at or above which the room counts as bright
    pub light_bright: u16,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            db_min: 35.0,
            db_max: 80.0,
            light_dark: 10,
            light_bright: 40,
        }
    }
}

impl CalibrationConfig {
    pub fn apply<MA, MD, PA, PD>(
        &self,
        sound: &mut Max9814Sensor<MA, MD>,
        light: &mut PhotoresistorSensor<PA, PD>,
    ) where
        MA: AnalogInput,
        MD: DelayNs,
        PA: AnalogInput,
        PD: DelayNs,
    {
        sound.set_db_range(self.db_min, self.db_max);
        light.set_thresholds(self.light_dark, self.light_bright);
    }
}
