//! Fakes shared by the unit tests.
//!
//! Fakes that tests need to inspect after handing them to a driver keep their
//! state behind an `Rc`, so a clone stays connected to the original.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::convert::Infallible;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use embedded_hal::digital;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{self, Operation};

use crate::credentials::KeyValueStore;
use crate::display_manager::{TextSize, TextSurface};
use crate::network::{Header, HttpClient, WifiLink};
use crate::sensors::crc::encode_word;
use crate::sensors::{
    AirQualityReadings, AnalogInput, ClimateReadings, IaqBaseline, IaqCalibration, LightReadings,
    ROW_HEIGHT, Sensor, SensorError, SensorKind, SensorReadings, SoundReadings,
};

// ---------------------------------------------------------------------------
// I2C
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeI2cError;

impl i2c::Error for FakeI2cError {
    fn kind(&self) -> i2c::ErrorKind {
        i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address)
    }
}

#[derive(Default)]
struct BusState {
    writes: Vec<(u8, Vec<u8>)>,
    reads: VecDeque<Result<Vec<u8>, FakeI2cError>>,
    fail_writes: bool,
}

/// I2C bus that records every write and answers reads from a queue.
///
/// A read with nothing queued fails, as does every write while
/// [`ScriptedI2c::fail_writes`] is set.
#[derive(Clone, Default)]
pub struct ScriptedI2c {
    state: Rc<RefCell<BusState>>,
}

impl ScriptedI2c {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the bytes returned by the next read.
    pub fn queue_read(&self, bytes: &[u8]) {
        self.state.borrow_mut().reads.push_back(Ok(bytes.to_vec()));
    }

    /// Queue a read that answers with the given words, each followed by its CRC.
    pub fn queue_words(&self, words: &[u16]) {
        let bytes: Vec<u8> = words.iter().flat_map(|w| encode_word(*w)).collect();
        self.queue_read(&bytes);
    }

    /// Queue a read that fails.
    pub fn queue_read_error(&self) {
        self.state.borrow_mut().reads.push_back(Err(FakeI2cError));
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_writes = fail;
    }

    /// Every write so far as `(address, bytes)`.
    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        self.state.borrow().writes.clone()
    }

    /// Just the bytes of every write so far.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state
            .borrow()
            .writes
            .iter()
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }

    pub fn pending_reads(&self) -> usize {
        self.state.borrow().reads.len()
    }
}

impl i2c::ErrorType for ScriptedI2c {
    type Error = FakeI2cError;
}

impl i2c::I2c for ScriptedI2c {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    if state.fail_writes {
                        return Err(FakeI2cError);
                    }
                    state.writes.push((address, bytes.to_vec()));
                }
                Operation::Read(buf) => {
                    let data = state.reads.pop_front().unwrap_or(Err(FakeI2cError))?;
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Analog input and delay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeAnalogError;

#[derive(Default)]
struct AnalogState {
    queue: VecDeque<u16>,
    fallback: Option<u16>,
    reads: usize,
}

/// Analog source that returns queued samples, then a fixed fallback.
#[derive(Clone, Default)]
pub struct FakeAnalog {
    state: Rc<RefCell<AnalogState>>,
}

impl FakeAnalog {
    /// A source that always reads `value`.
    pub fn constant(value: u16) -> Self {
        let fake = Self::default();
        fake.state.borrow_mut().fallback = Some(value);
        fake
    }

    /// A source that fails once `samples` run out.
    pub fn sequence(samples: &[u16]) -> Self {
        let fake = Self::default();
        fake.push(samples);
        fake
    }

    pub fn push(&self, samples: &[u16]) {
        self.state.borrow_mut().queue.extend(samples.iter().copied());
    }

    pub fn set_fallback(&self, value: Option<u16>) {
        self.state.borrow_mut().fallback = value;
    }

    pub fn reads(&self) -> usize {
        self.state.borrow().reads
    }
}

impl AnalogInput for FakeAnalog {
    type Error = FakeAnalogError;

    async fn read(&mut self) -> Result<u16, Self::Error> {
        let mut state = self.state.borrow_mut();
        state.reads += 1;
        match state.queue.pop_front() {
            Some(value) => Ok(value),
            None => state.fallback.ok_or(FakeAnalogError),
        }
    }
}

/// Delay that returns immediately and adds up the time requested.
#[derive(Clone, Default)]
pub struct CountingDelay {
    total_ns: Rc<Cell<u64>>,
}

impl CountingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.total_ns.get() / 1_000_000
    }
}

impl DelayNs for CountingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ns.set(self.total_ns.get() + u64::from(ns));
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DrawnText {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub size: TextSize,
}

/// Text surface that keeps what was drawn since the last clear.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub texts: Vec<DrawnText>,
    pub clears: usize,
    pub flushes: usize,
}

impl RecordingSurface {
    pub fn lines(&self) -> Vec<&str> {
        self.texts.iter().map(|t| t.text.as_str()).collect()
    }
}

impl TextSurface for RecordingSurface {
    fn clear(&mut self) {
        self.texts.clear();
        self.clears += 1;
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32, size: TextSize) {
        self.texts.push(DrawnText {
            text: text.to_string(),
            x,
            y,
            size,
        });
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}

/// Draw target that records every contiguous fill it receives.
pub struct RecordingTarget {
    size: Size,
    pub fills: Vec<(Rectangle, Vec<Rgb565>)>,
}

impl RecordingTarget {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            fills: Vec::new(),
        }
    }
}

impl OriginDimensions for RecordingTarget {
    fn size(&self) -> Size {
        self.size
    }
}

impl DrawTarget for RecordingTarget {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, _pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        self.fills.push((*area, colors.into_iter().collect()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GPIO
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPinError;

impl digital::Error for MockPinError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

/// Output pin whose level can be read back through any clone.
#[derive(Clone, Default)]
pub struct MockPin {
    high: Rc<Cell<bool>>,
    fail: bool,
}

impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pin whose every write fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn is_high(&self) -> bool {
        self.high.get()
    }
}

impl digital::ErrorType for MockPin {
    type Error = MockPinError;
}

impl digital::OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.fail {
            return Err(MockPinError);
        }
        self.high.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if self.fail {
            return Err(MockPinError);
        }
        self.high.set(true);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Storage and network
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryStoreError {
    BufferTooSmall,
}

/// Key/value store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn with(mut self, key: &str, value: &[u8]) -> Self {
        self.entries.insert(key.to_string(), value.to_vec());
        self
    }

    pub fn value(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }
}

impl KeyValueStore for MemoryStore {
    type Error = MemoryStoreError;

    fn get(&mut self, key: &str, buf: &mut [u8]) -> Result<Option<usize>, Self::Error> {
        let Some(value) = self.entries.get(key) else {
            return Ok(None);
        };
        let dst = buf
            .get_mut(..value.len())
            .ok_or(MemoryStoreError::BufferTooSmall)?;
        dst.copy_from_slice(value);
        Ok(Some(value.len()))
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeNetError;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPost {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// WiFi link and HTTP client that records what it is asked to do.
#[derive(Debug)]
pub struct FakeNetwork {
    pub connected: bool,
    /// Number of upcoming connect attempts that fail before one succeeds.
    pub connect_failures: usize,
    pub connect_calls: Vec<(String, String)>,
    pub posts: Vec<RecordedPost>,
    pub status: Result<u16, FakeNetError>,
}

impl Default for FakeNetwork {
    fn default() -> Self {
        Self {
            connected: false,
            connect_failures: 0,
            connect_calls: Vec::new(),
            posts: Vec::new(),
            status: Ok(200),
        }
    }
}

impl FakeNetwork {
    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }
}

impl WifiLink for FakeNetwork {
    type Error = FakeNetError;

    async fn connect(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error> {
        self.connect_calls
            .push((ssid.to_string(), password.to_string()));
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(FakeNetError);
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl HttpClient for FakeNetwork {
    type Error = FakeNetError;

    async fn post(
        &mut self,
        url: &str,
        headers: &[Header<'_>],
        body: &[u8],
    ) -> Result<u16, Self::Error> {
        self.posts.push(RecordedPost {
            url: url.to_string(),
            headers: headers
                .iter()
                .map(|h| (h.name.to_string(), h.value.to_string()))
                .collect(),
            body: String::from_utf8_lossy(body).into_owned(),
        });
        self.status
    }
}

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Readings types that a [`FakeSensor`] can stand in for.
pub trait FakeReadings<const COUNT: usize>: SensorReadings<COUNT> {
    const KIND: SensorKind;
}

impl FakeReadings<2> for ClimateReadings {
    const KIND: SensorKind = SensorKind::Climate;
}

impl FakeReadings<2> for AirQualityReadings {
    const KIND: SensorKind = SensorKind::AirQuality;
}

impl FakeReadings<1> for SoundReadings {
    const KIND: SensorKind = SensorKind::Sound;
}

impl FakeReadings<1> for LightReadings {
    const KIND: SensorKind = SensorKind::Light;
}

pub struct FakeSensorState<R> {
    pub begin_failures: u8,
    pub begin_calls: u8,
    pub measure_calls: usize,
    /// What the next measurement produces. `None` makes it fail.
    pub next: Option<R>,
    pub baseline: IaqBaseline,
    pub restored_baseline: Option<IaqBaseline>,
    pub humidity: Option<u32>,
    ready: bool,
    readings: Option<R>,
}

/// Sensor that produces whatever readings the test hands it.
pub struct FakeSensor<R> {
    state: Rc<RefCell<FakeSensorState<R>>>,
}

impl<R> Clone for FakeSensor<R> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<R: Copy> FakeSensor<R> {
    pub fn new(readings: R) -> Self {
        Self {
            state: Rc::new(RefCell::new(FakeSensorState {
                begin_failures: 0,
                begin_calls: 0,
                measure_calls: 0,
                next: Some(readings),
                baseline: IaqBaseline::default(),
                restored_baseline: None,
                humidity: None,
                ready: false,
                readings: None,
            })),
        }
    }

    pub fn state(&self) -> core::cell::RefMut<'_, FakeSensorState<R>> {
        self.state.borrow_mut()
    }
}

impl<R, const COUNT: usize> Sensor<COUNT> for FakeSensor<R>
where
    R: FakeReadings<COUNT>,
{
    type Readings = R;
    const KIND: SensorKind = R::KIND;

    async fn begin(&mut self) -> Result<(), SensorError> {
        let mut state = self.state.borrow_mut();
        state.begin_calls += 1;
        if state.begin_failures > 0 {
            state.begin_failures -= 1;
            return Err(SensorError::NotFound {
                sensor: R::KIND.name(),
                details: "no ACK",
            });
        }
        state.ready = true;
        Ok(())
    }

    async fn measure(&mut self) -> Result<(), SensorError> {
        let mut state = self.state.borrow_mut();
        if !state.ready {
            return Err(SensorError::NotInitialized {
                sensor: R::KIND.name(),
            });
        }
        state.measure_calls += 1;
        match state.next {
            Some(readings) => {
                state.readings = Some(readings);
                Ok(())
            }
            None => Err(SensorError::ReadFailed {
                sensor: R::KIND.name(),
                operation: "measure",
                details: "scripted failure",
            }),
        }
    }

    fn is_ready(&self) -> bool {
        self.state.borrow().ready
    }

    fn readings(&self) -> Option<R> {
        self.state.borrow().readings
    }

    fn print_measurements(&self) {}

    fn display_measurements<T: TextSurface>(&self, surface: &mut T, cursor: &mut i32) {
        if self.readings().is_some() {
            surface.draw_text(R::KIND.name(), 5, *cursor, TextSize::Medium);
            *cursor += ROW_HEIGHT;
        }
    }
}

impl<R> IaqCalibration for FakeSensor<R> {
    async fn baseline(&mut self) -> Result<IaqBaseline, SensorError> {
        Ok(self.state.borrow().baseline)
    }

    async fn set_baseline(&mut self, baseline: IaqBaseline) -> Result<(), SensorError> {
        self.state.borrow_mut().restored_baseline = Some(baseline);
        Ok(())
    }

    async fn set_humidity(&mut self, absolute_mg_m3: u32) -> Result<(), SensorError> {
        self.state.borrow_mut().humidity = Some(absolute_mg_m3);
        Ok(())
    }
}
