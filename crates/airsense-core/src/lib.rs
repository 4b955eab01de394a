//! Hardware-independent core library for airsense
//!
//! This crate contains all platform-agnostic logic for the airsense
//! environmental monitoring station: the sensor contract and the four sensor
//! drivers, the framebuffer-backed display adapter, threshold alerting with
//! status LEDs, the JSON upload client and the polling loop that ties them
//! together.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod alerts;
pub mod app_state;
pub mod async_i2c_bus;
pub mod config;
pub mod credentials;
pub mod display_manager;
pub mod framebuffer;
pub mod interval;
pub mod metrics;
pub mod network;
pub mod sensors;
pub mod setup;
pub mod station;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_utils;
