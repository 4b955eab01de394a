//! WiFi and upload credentials loaded from the platform key/value store

use core::fmt::Debug;

use heapless::String;
use log::{info, warn};

pub const SSID_KEY: &str = "ssid";
pub const PASSWORD_KEY: &str = "password";
pub const AUTH_HEADER_KEY: &str = "auth_header";

/// Small persistent key/value store, such as NVS flash.
pub trait KeyValueStore {
    type Error: Debug;

    /// Copy the value stored under `key` into `buf`.
    ///
    /// Returns the value length, or `None` if the key is absent.
    fn get(&mut self, key: &str, buf: &mut [u8]) -> Result<Option<usize>, Self::Error>;

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), Self::Error>;
}

/// Credentials read once at boot. Missing entries are left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: String<32>,
    pub password: String<64>,
    pub auth_header: String<128>,
}

impl Credentials {
    pub fn load<S: KeyValueStore>(store: &mut S) -> Self {
        let credentials = Self {
            ssid: read_string(store, SSID_KEY),
            password: read_string(store, PASSWORD_KEY),
            auth_header: read_string(store, AUTH_HEADER_KEY),
        };

        info!("Loaded credentials for SSID \"{}\"", credentials.ssid);
        credentials
    }
}

/// Read a UTF-8 value, dropping trailing NUL padding. Any problem is logged
/// and yields an empty string.
fn read_string<S: KeyValueStore, const N: usize>(store: &mut S, key: &str) -> String<N> {
    let mut buf = [0u8; N];
    let len = match store.get(key, &mut buf) {
        Ok(Some(len)) => len.min(N),
        Ok(None) => {
            warn!("No value stored for \"{}\"", key);
            return String::new();
        }
        Err(e) => {
            warn!("Failed to read \"{}\" from store: {:?}", key, e);
            return String::new();
        }
    };

    let bytes = &buf[..len];
    let end = bytes
        .iter()
        .rposition(|b| *b != 0)
        .map_or(0, |last| last + 1);

    match core::str::from_utf8(&bytes[..end]) {
        Ok(text) => {
            let mut value = String::new();
            // Cannot overflow: text is at most N bytes.
            let _ = value.push_str(text);
            value
        }
        Err(_) => {
            warn!("Value for \"{}\" is not valid UTF-8", key);
            String::new()
        }
    }
}
