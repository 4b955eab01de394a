//! Shared async I2C bus
//!
//! The DHT20 and the SGP30 sit on the same I2C bus. Each driver gets its own
//! [`SharedI2cDevice`] handle; every transaction locks the bus for its whole
//! duration so that the two drivers never interleave on the wire.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal_async::i2c::{ErrorType, I2c, Operation};

/// One device's handle on a bus shared through an embassy-sync [`Mutex`].
///
/// The station runs on a single executor task, so the firmware uses
/// `NoopRawMutex`; any other `RawMutex` works as well.
///
/// # Example
///
/// ```ignore
/// use embassy_sync::blocking_mutex::raw::NoopRawMutex;
/// use embassy_sync::mutex::Mutex;
/// use static_cell::StaticCell;
///
/// static I2C_BUS: StaticCell<Mutex<NoopRawMutex, I2c<'static, Async>>> = StaticCell::new();
///
/// let bus = I2C_BUS.init(Mutex::new(i2c));
/// let dht20 = Dht20Sensor::new(SharedI2cDevice::new(bus), Delay);
/// let sgp30 = Sgp30Sensor::new(SharedI2cDevice::new(bus), Delay);
/// ```
pub struct SharedI2cDevice<'a, M: RawMutex, T> {
    bus: &'a Mutex<M, T>,
}

impl<'a, M: RawMutex, T> SharedI2cDevice<'a, M, T> {
    #[inline]
    pub const fn new(bus: &'a Mutex<M, T>) -> Self {
        Self { bus }
    }
}

impl<M: RawMutex, T> Clone for SharedI2cDevice<'_, M, T> {
    fn clone(&self) -> Self {
        Self { bus: self.bus }
    }
}

impl<M, T> ErrorType for SharedI2cDevice<'_, M, T>
where
    M: RawMutex,
    T: ErrorType,
{
    type Error = T::Error;
}

impl<M, T> I2c for SharedI2cDevice<'_, M, T>
where
    M: RawMutex,
    T: I2c,
{
    #[inline]
    async fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock().await;
        bus.read(address, read).await
    }

    #[inline]
    async fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock().await;
        bus.write(address, write).await
    }

    #[inline]
    async fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock().await;
        bus.write_read(address, write, read).await
    }

    /// Run all `operations` while holding the bus lock.
    #[inline]
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock().await;
        bus.transaction(address, operations).await
    }
}
