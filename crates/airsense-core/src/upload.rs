//! JSON upload of the latest readings
//!
//! One fixed-shape document per upload interval, posted once. Failures are
//! reported to the caller, which logs them; nothing is queued or retried.

use core::fmt::{self, Write};

use heapless::String;
use log::{info, warn};
use thiserror_no_std::Error;

use crate::app_state::error_details;
use crate::network::{Header, HttpClient, WifiLink};
use crate::sensors::{AirQualityReadings, ClimateReadings, LightReadings, SoundReadings};

/// Upper bound on the serialized document size.
pub const PAYLOAD_CAPACITY: usize = 320;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("WiFi is not connected")]
    NotConnected,
    #[error("not every sensor has produced a reading yet")]
    MissingReadings,
    #[error("payload does not fit in the upload buffer")]
    PayloadTooLarge,
    #[error("transport error: {0}")]
    Transport(String<64>),
    #[error("no HTTP response")]
    NoResponse,
}

/// The values sent to the collection endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadPayload {
    pub temperature: f32,
    pub humidity: f32,
    pub light: f32,
    pub decibel: f32,
    pub eco2: u16,
    pub tvoc: u16,
    pub raw_h2: u16,
    pub raw_ethanol: u16,
}

impl UploadPayload {
    /// Combine the latest readings, or `None` while any sensor has none.
    pub fn from_readings(
        climate: Option<ClimateReadings>,
        air: Option<AirQualityReadings>,
        sound: Option<SoundReadings>,
        light: Option<LightReadings>,
    ) -> Option<Self> {
        let climate = climate?;
        let air = air?;
        Some(Self {
            temperature: climate.temperature_c,
            humidity: climate.humidity,
            light: light?.percent,
            decibel: sound?.decibels,
            eco2: air.eco2,
            tvoc: air.tvoc,
            raw_h2: air.raw_h2,
            raw_ethanol: air.raw_ethanol,
        })
    }

    /// Serialize into a fixed-capacity buffer.
    pub fn to_json(&self) -> Result<String<PAYLOAD_CAPACITY>, UploadError> {
        let mut body = String::new();
        write!(body, "{}", self).map_err(|_| UploadError::PayloadTooLarge)?;
        Ok(body)
    }
}

/// A float with two decimals, or `null` when it is not finite.
struct Decimal(f32);

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_finite() {
            write!(f, "{:.2}", self.0)
        } else {
            f.write_str("null")
        }
    }
}

impl fmt::Display for UploadPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{\"temperature\":{},\"humidity\":{},\"light\":{},\"decibel\":{},",
            Decimal(self.temperature),
            Decimal(self.humidity),
            Decimal(self.light),
            Decimal(self.decibel)
        )?;
        write!(
            f,
            "\"eCO2\":{},\"TVOC\":{},\"rawH2\":{},\"rawEthanol\":{}}}",
            self.eco2, self.tvoc, self.raw_h2, self.raw_ethanol
        )
    }
}

/// POST `payload` to `url`, returning the response status.
///
/// `auth` becomes the `Authorization` header unless it is empty.
pub async fn send_sensor_data<N>(
    network: &mut N,
    url: &str,
    auth: &str,
    payload: &UploadPayload,
) -> Result<u16, UploadError>
where
    N: WifiLink + HttpClient,
{
    if !network.is_connected() {
        return Err(UploadError::NotConnected);
    }

    let body = payload.to_json()?;

    let content_type = Header::new("Content-Type", "application/json");
    let authorization = Header::new("Authorization", auth);
    let all = [content_type, authorization];
    let headers = if auth.is_empty() { &all[..1] } else { &all[..] };

    let status = network
        .post(url, headers, body.as_bytes())
        .await
        .map_err(|e| UploadError::Transport(error_details(&e)))?;

    if status == 0 {
        return Err(UploadError::NoResponse);
    }
    if (200..300).contains(&status) {
        info!("HTTP Response code: {}", status);
    } else {
        warn!("HTTP Response code: {}", status);
    }
    Ok(status)
}
