//! Emulated station hardware
//!
//! A virtual clock, a slowly drifting indoor climate, the two I2C sensors
//! speaking their real wire protocol, the two analog inputs and the status
//! LED pins. Everything is single-threaded and shares state through `Rc`.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;
use std::time::Duration;

use airsense_core::sensors::AnalogInput;
use airsense_core::sensors::crc::{crc8, decode_word, encode_word};
use airsense_core::sensors::max9814::DC_OFFSET;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{self, Operation};
use log::debug;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Milliseconds since boot. Advanced by every delay the firmware asks for.
#[derive(Clone)]
pub struct SimClock {
    now_ns: Rc<Cell<u64>>,
    realtime: bool,
}

impl SimClock {
    pub fn new(realtime: bool) -> Self {
        Self {
            now_ns: Rc::new(Cell::new(0)),
            realtime,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ns.get() / 1_000_000
    }

    fn now_secs(&self) -> f64 {
        self.now_ns.get() as f64 / 1e9
    }

    fn advance_ns(&self, ns: u64) {
        self.now_ns.set(self.now_ns.get() + ns);
        if self.realtime {
            std::thread::sleep(Duration::from_nanos(ns));
        }
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay {
            clock: self.clone(),
        }
    }
}

pub struct SimDelay {
    clock: SimClock,
}

impl DelayNs for SimDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.clock.advance_ns(u64::from(ns));
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// What the room looks like at one instant.
#[derive(Debug, Clone, Copy)]
struct Conditions {
    temperature_c: f64,
    humidity: f64,
    eco2: f64,
    tvoc: f64,
    raw_h2: f64,
    raw_ethanol: f64,
    /// Peak microphone swing around the DC offset, in ADC counts
    noise_amplitude: f64,
    /// Photoresistor divider output, in ADC counts
    light_raw: f64,
}

/// Smooth synthetic conditions. The eCO2 swing crosses the warning
/// threshold every few minutes.
fn conditions_at(t: f64) -> Conditions {
    Conditions {
        temperature_c: 23.0 + 3.0 * (t / 120.0).sin() + 0.5 * (t / 37.0).cos(),
        humidity: 50.0 + 10.0 * (t / 180.0).sin() + 2.0 * (t / 23.0).cos(),
        eco2: 700.0 + 400.0 * (t / 90.0).sin() + 30.0 * (t / 41.0).cos(),
        tvoc: 150.0 + 100.0 * (t / 75.0).sin(),
        raw_h2: 13_000.0 + 300.0 * (t / 50.0).sin(),
        raw_ethanol: 18_500.0 + 400.0 * (t / 65.0).cos(),
        noise_amplitude: 400.0 + 350.0 * (t / 20.0).sin().abs(),
        light_raw: 25.0 + 15.0 * (t / 60.0).sin(),
    }
}

// ---------------------------------------------------------------------------
// I2C bus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimBusError {
    AddressNak,
    DataNak,
}

impl i2c::Error for SimBusError {
    fn kind(&self) -> i2c::ErrorKind {
        match self {
            Self::AddressNak => i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address),
            Self::DataNak => i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Data),
        }
    }
}

/// The station's I2C bus with a DHT20 at 0x38 and an SGP30 at 0x58.
pub struct EmulatedBus {
    dht20: Dht20Device,
    sgp30: Sgp30Device,
}

impl EmulatedBus {
    pub fn new(clock: SimClock) -> Self {
        Self {
            dht20: Dht20Device {
                clock: clock.clone(),
            },
            sgp30: Sgp30Device::new(clock),
        }
    }
}

impl i2c::ErrorType for EmulatedBus {
    type Error = SimBusError;
}

impl i2c::I2c for EmulatedBus {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for op in operations {
            match (address, op) {
                (0x38, Operation::Write(bytes)) => self.dht20.write(bytes)?,
                (0x38, Operation::Read(buf)) => self.dht20.read(buf),
                (0x58, Operation::Write(bytes)) => self.sgp30.write(bytes)?,
                (0x58, Operation::Read(buf)) => self.sgp30.read(buf)?,
                _ => return Err(SimBusError::AddressNak),
            }
        }
        Ok(())
    }
}

struct Dht20Device {
    clock: SimClock,
}

impl Dht20Device {
    /// Calibrated, idle
    const STATUS: u8 = 0x18;

    fn write(&mut self, bytes: &[u8]) -> Result<(), SimBusError> {
        match bytes {
            [0xBA] | [0xBE, 0x08, 0x00] | [0xAC, 0x33, 0x00] => Ok(()),
            _ => Err(SimBusError::DataNak),
        }
    }

    fn read(&mut self, buf: &mut [u8]) {
        let now = conditions_at(self.clock.now_secs());
        let humidity = ((now.humidity / 100.0) * 1_048_576.0) as u32;
        let temperature = (((now.temperature_c + 50.0) / 200.0) * 1_048_576.0) as u32;

        let mut frame = [
            Self::STATUS,
            (humidity >> 12) as u8,
            (humidity >> 4) as u8,
            (((humidity & 0x0F) << 4) | ((temperature >> 16) & 0x0F)) as u8,
            (temperature >> 8) as u8,
            temperature as u8,
            0,
        ];
        frame[6] = crc8(&frame[..6]);

        let n = buf.len().min(frame.len());
        buf[..n].copy_from_slice(&frame[..n]);
    }
}

struct Sgp30Device {
    clock: SimClock,
    pending: Option<u16>,
    initialized_at_ms: Option<u64>,
    baseline: (u16, u16),
}

impl Sgp30Device {
    /// The IAQ algorithm reports fixed values while it warms up.
    const WARMUP_MS: u64 = 15_000;

    fn new(clock: SimClock) -> Self {
        Self {
            clock,
            pending: None,
            initialized_at_ms: None,
            baseline: (0x8F3E, 0x9124),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), SimBusError> {
        let [msb, lsb, args @ ..] = bytes else {
            return Err(SimBusError::DataNak);
        };
        let words: Vec<u16> = args
            .chunks(3)
            .map(decode_word)
            .collect::<Option<_>>()
            .ok_or(SimBusError::DataNak)?;

        match (u16::from_be_bytes([*msb, *lsb]), words.as_slice()) {
            (0x2003, []) => {
                self.initialized_at_ms = Some(self.clock.now_ms());
                self.pending = None;
            }
            (0x201E, [tvoc, eco2]) => {
                debug!("SGP30 baseline set to eCO2 {:#06X}, TVOC {:#06X}", eco2, tvoc);
                self.baseline = (*eco2, *tvoc);
            }
            (0x2061, [humidity]) => debug!("SGP30 humidity compensation {:#06X}", humidity),
            (command @ (0x3682 | 0x202F | 0x2008 | 0x2050 | 0x2015), []) => {
                self.pending = Some(command);
            }
            _ => return Err(SimBusError::DataNak),
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), SimBusError> {
        let now = conditions_at(self.clock.now_secs());
        let warming_up = self
            .initialized_at_ms
            .is_none_or(|at| self.clock.now_ms().saturating_sub(at) < Self::WARMUP_MS);

        let words: Vec<u16> = match self.pending.take().ok_or(SimBusError::DataNak)? {
            0x3682 => vec![0x0000, 0x0148, 0x2C1E],
            0x202F => vec![0x0022],
            0x2008 if warming_up => vec![400, 0],
            0x2008 => vec![now.eco2 as u16, now.tvoc as u16],
            0x2050 => vec![now.raw_h2 as u16, now.raw_ethanol as u16],
            0x2015 => vec![self.baseline.0, self.baseline.1],
            _ => return Err(SimBusError::DataNak),
        };

        let bytes: Vec<u8> = words.into_iter().flat_map(encode_word).collect();
        let n = buf.len().min(bytes.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Analog inputs
// ---------------------------------------------------------------------------

/// Microphone amplifier output swinging around its DC offset.
pub struct SyntheticMic {
    clock: SimClock,
    phase: f64,
}

impl SyntheticMic {
    pub fn new(clock: SimClock) -> Self {
        Self { clock, phase: 0.0 }
    }
}

impl AnalogInput for SyntheticMic {
    type Error = Infallible;

    async fn read(&mut self) -> Result<u16, Self::Error> {
        let amplitude = conditions_at(self.clock.now_secs()).noise_amplitude;
        self.phase += 0.9;
        let value = f64::from(DC_OFFSET) + amplitude * self.phase.sin();
        Ok(value.max(0.0) as u16)
    }
}

/// Photoresistor divider following a slow day/night curve.
pub struct SyntheticLight {
    clock: SimClock,
}

impl SyntheticLight {
    pub fn new(clock: SimClock) -> Self {
        Self { clock }
    }
}

impl AnalogInput for SyntheticLight {
    type Error = Infallible;

    async fn read(&mut self) -> Result<u16, Self::Error> {
        Ok(conditions_at(self.clock.now_secs()).light_raw.max(0.0) as u16)
    }
}

// ---------------------------------------------------------------------------
// LEDs
// ---------------------------------------------------------------------------

/// Status LED whose state the simulator reports at exit.
#[derive(Clone)]
pub struct IndicatorPin {
    name: &'static str,
    lit: Rc<RefCell<bool>>,
}

impl IndicatorPin {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            lit: Rc::new(RefCell::new(false)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_lit(&self) -> bool {
        *self.lit.borrow()
    }
}

impl digital::ErrorType for IndicatorPin {
    type Error = Infallible;
}

impl OutputPin for IndicatorPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        *self.lit.borrow_mut() = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if !self.is_lit() {
            debug!("{} LED on", self.name);
        }
        *self.lit.borrow_mut() = true;
        Ok(())
    }
}
