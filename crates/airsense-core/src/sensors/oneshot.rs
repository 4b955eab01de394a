//! One-shot ADC sampling behind the [`AnalogInput`] trait

use core::fmt::Debug;

use embassy_futures::yield_now;
use log::warn;
use thiserror_no_std::Error;

use super::AnalogInput;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{channel} ADC conversion failed")]
pub struct AdcReadError {
    pub channel: &'static str,
}

/// An ADC channel sampled by polling a one-shot conversion.
///
/// `sample` starts or polls a conversion, returning `WouldBlock` until the
/// result is ready. The executor gets control back between polls.
pub struct OneShotInput<F> {
    channel: &'static str,
    sample: F,
}

impl<F, E> OneShotInput<F>
where
    F: FnMut() -> nb::Result<u16, E>,
    E: Debug,
{
    /// `channel` names the converter and pin in logs, e.g. `"ADC2/GPIO12"`.
    pub fn new(channel: &'static str, sample: F) -> Self {
        Self { channel, sample }
    }
}

impl<F, E> AnalogInput for OneShotInput<F>
where
    F: FnMut() -> nb::Result<u16, E>,
    E: Debug,
{
    type Error = AdcReadError;

    async fn read(&mut self) -> Result<u16, Self::Error> {
        loop {
            match (self.sample)() {
                Ok(value) => return Ok(value),
                Err(nb::Error::WouldBlock) => yield_now().await,
                Err(nb::Error::Other(e)) => {
                    warn!("{} conversion failed: {:?}", self.channel, e);
                    return Err(AdcReadError {
                        channel: self.channel,
                    });
                }
            }
        }
    }
}
