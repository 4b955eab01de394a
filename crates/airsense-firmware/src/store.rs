//! Key/value store backed by build-time credentials and RAM
//!
//! WiFi and upload credentials are compiled in by `build.rs`. Values written
//! at runtime (the gas sensor baseline) live in RAM and shadow the compiled-in
//! ones until the next reset.

use airsense_core::credentials::{AUTH_HEADER_KEY, KeyValueStore, PASSWORD_KEY, SSID_KEY};
use heapless::{LinearMap, String, Vec};
use thiserror_no_std::Error;

const MAX_KEY_LEN: usize = 16;
const MAX_VALUE_LEN: usize = 32;
const MAX_ENTRIES: usize = 4;

const COMPILED_IN: [(&str, &str); 3] = [
    (SSID_KEY, env!("AIRSENSE_SSID")),
    (PASSWORD_KEY, env!("AIRSENSE_PASSWORD")),
    (AUTH_HEADER_KEY, env!("AIRSENSE_AUTH_HEADER")),
];

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("key is too long")]
    KeyTooLong,
    #[error("value is too large")]
    ValueTooLarge,
    #[error("store is full")]
    Full,
    #[error("read buffer is too small")]
    BufferTooSmall,
}

#[derive(Default)]
pub struct FirmwareStore {
    written: LinearMap<String<MAX_KEY_LEN>, Vec<u8, MAX_VALUE_LEN>, MAX_ENTRIES>,
}

impl FirmwareStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, key: &str) -> Option<&[u8]> {
        if let Some((_, value)) = self.written.iter().find(|(k, _)| k.as_str() == key) {
            return Some(value.as_slice());
        }
        COMPILED_IN
            .iter()
            .find(|(k, v)| *k == key && !v.is_empty())
            .map(|(_, v)| v.as_bytes())
    }
}

impl KeyValueStore for FirmwareStore {
    type Error = StoreError;

    fn get(&mut self, key: &str, buf: &mut [u8]) -> Result<Option<usize>, Self::Error> {
        let Some(value) = self.lookup(key) else {
            return Ok(None);
        };
        buf.get_mut(..value.len())
            .ok_or(StoreError::BufferTooSmall)?
            .copy_from_slice(value);
        Ok(Some(value.len()))
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        let key: String<MAX_KEY_LEN> = key.try_into().map_err(|_| StoreError::KeyTooLong)?;
        let value = Vec::from_slice(value).map_err(|_| StoreError::ValueTooLarge)?;
        self.written
            .insert(key, value)
            .map_err(|_| StoreError::Full)?;
        Ok(())
    }
}
