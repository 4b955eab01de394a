//! Host-side stand-ins for WiFi, HTTP and flash storage

use std::collections::HashMap;

use airsense_core::credentials::{AUTH_HEADER_KEY, KeyValueStore, PASSWORD_KEY, SSID_KEY};
use airsense_core::network::{Header, HttpClient, WifiLink};
use log::{debug, info};

#[derive(Debug)]
pub enum SimNetError {
    NoSsid,
    NotConnected,
}

/// Pretends to join any named network and logs every upload.
#[derive(Default)]
pub struct LoggingNetwork {
    connected: bool,
    uploads: usize,
}

impl LoggingNetwork {
    pub fn uploads(&self) -> usize {
        self.uploads
    }
}

impl WifiLink for LoggingNetwork {
    type Error = SimNetError;

    async fn connect(&mut self, ssid: &str, _password: &str) -> Result<(), Self::Error> {
        if ssid.is_empty() {
            return Err(SimNetError::NoSsid);
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl HttpClient for LoggingNetwork {
    type Error = SimNetError;

    async fn post(
        &mut self,
        url: &str,
        headers: &[Header<'_>],
        body: &[u8],
    ) -> Result<u16, Self::Error> {
        if !self.connected {
            return Err(SimNetError::NotConnected);
        }

        for header in headers {
            debug!("{}: {}", header.name, header.value);
        }
        info!("POST {} {}", url, String::from_utf8_lossy(body));

        self.uploads += 1;
        Ok(200)
    }
}

#[derive(Debug)]
pub enum StoreError {
    BufferTooSmall,
}

/// Volatile key/value store, seeded from `AIRSENSE_*` environment variables.
#[derive(Default)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn from_env() -> Self {
        let mut store = Self::default();
        for (key, var) in [
            (SSID_KEY, "AIRSENSE_SSID"),
            (PASSWORD_KEY, "AIRSENSE_PASSWORD"),
            (AUTH_HEADER_KEY, "AIRSENSE_AUTH_HEADER"),
        ] {
            if let Ok(value) = std::env::var(var) {
                store.entries.insert(key.to_owned(), value.into_bytes());
            }
        }
        store
    }
}

impl KeyValueStore for MemoryStore {
    type Error = StoreError;

    fn get(&mut self, key: &str, buf: &mut [u8]) -> Result<Option<usize>, Self::Error> {
        let Some(value) = self.entries.get(key) else {
            return Ok(None);
        };
        buf.get_mut(..value.len())
            .ok_or(StoreError::BufferTooSmall)?
            .copy_from_slice(value);
        Ok(Some(value.len()))
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        debug!("store[{}] = {} bytes", key, value.len());
        self.entries.insert(key.to_owned(), value.to_vec());
        Ok(())
    }
}
