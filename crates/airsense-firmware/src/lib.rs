//! ESP32-S3 firmware-specific modules for airsense
//!
//! This crate contains the hardware-specific code that cannot compile on
//! desktop targets: peripheral setup, the WiFi station with its HTTP
//! transport, and the compiled-in credential store.
//! Everything else comes from `airsense_core`.

#![no_std]

extern crate alloc;

pub mod hardware;
pub mod net;
pub mod store;
