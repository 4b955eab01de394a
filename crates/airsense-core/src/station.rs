//! The station: one-time setup followed by a fixed-cadence polling loop
//!
//! Every tick the station clears the screen, measures each sensor in a fixed
//! order, draws and logs what it got, folds every metric into the tick's
//! alert level, lights the matching LED and flushes the screen. Two interval
//! timers piggyback on the tick: the JSON upload and the gas sensor baseline
//! save.
//!
//! A sensor whose measurement fails is skipped for that tick: it draws
//! nothing and contributes nothing to the alert level.

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

use crate::alerts::{AlertEvaluator, StatusLeds};
use crate::app_state::{AppError, AppRunState, SetupError, error_details};
use crate::config::StationConfig;
use crate::credentials::{Credentials, KeyValueStore};
use crate::display_manager::TextSurface;
use crate::interval::IntervalTimer;
use crate::metrics::AlertLevel;
use crate::network::{HttpClient, WifiLink};
use crate::sensors::sgp30::absolute_humidity_mg_m3;
use crate::sensors::{
    AirQualityReadings, ClimateReadings, IaqBaseline, IaqCalibration, LightReadings, Sensor,
    SensorReadings, SoundReadings,
};
use crate::setup::begin_with_retry;
use crate::upload::{UploadError, UploadPayload, send_sensor_data};

/// Store key of the postcard-encoded gas sensor baseline.
pub const BASELINE_KEY: &str = "sgp30_base";

/// Y coordinate of the first line drawn each tick.
pub const TOP_MARGIN: i32 = 5;

/// Exactly one sensor of each kind.
pub struct SensorSuite<C, A, S, L> {
    pub climate: C,
    pub air: A,
    pub sound: S,
    pub light: L,
}

pub struct Station<C, A, S, L, T, N, K, G, Y, R> {
    config: StationConfig,
    sensors: SensorSuite<C, A, S, L>,
    display: T,
    leds: StatusLeds<G, Y, R>,
    network: N,
    store: K,
    alerts: AlertEvaluator,
    credentials: Credentials,
    run_state: AppRunState,
    upload_timer: IntervalTimer,
    baseline_timer: IntervalTimer,
    last_upload: Option<Result<u16, UploadError>>,
}

impl<C, A, S, L, T, N, K, G, Y, R> Station<C, A, S, L, T, N, K, G, Y, R>
where
    C: Sensor<2, Readings = ClimateReadings>,
    A: Sensor<2, Readings = AirQualityReadings> + IaqCalibration,
    S: Sensor<1, Readings = SoundReadings>,
    L: Sensor<1, Readings = LightReadings>,
    T: TextSurface,
    N: WifiLink + HttpClient,
    K: KeyValueStore,
    G: OutputPin,
    Y: OutputPin,
    R: OutputPin,
{
    pub fn new(
        config: StationConfig,
        sensors: SensorSuite<C, A, S, L>,
        display: T,
        leds: StatusLeds<G, Y, R>,
        network: N,
        store: K,
    ) -> Self {
        Self {
            upload_timer: IntervalTimer::new(config.upload.interval_ms),
            baseline_timer: IntervalTimer::new(config.baseline_save_interval_ms),
            config,
            sensors,
            display,
            leds,
            network,
            store,
            alerts: AlertEvaluator::new(),
            credentials: Credentials::default(),
            run_state: AppRunState::Uninitialized,
            last_upload: None,
        }
    }

    /// Start every sensor, restore calibration and join WiFi.
    ///
    /// A sensor that cannot be found within the retry policy is fatal. A
    /// failed WiFi connection is not: the station runs and skips uploads.
    pub async fn setup<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), SetupError> {
        self.run_state = AppRunState::SensorsStarting;
        if let Err(e) = self.start_sensors(delay).await {
            error!("{}", e);
            self.run_state = AppRunState::Error;
            return Err(e);
        }

        self.restore_baseline().await;
        self.credentials = Credentials::load(&mut self.store);

        self.run_state = AppRunState::WifiConnecting;
        self.connect_wifi(delay).await;

        if let Err(e) = self.leds.show(AlertLevel::Normal) {
            error!("Failed to set status LEDs: {:?}", e);
        }
        self.run_state = AppRunState::Running;
        info!("Setup complete");
        Ok(())
    }

    async fn start_sensors<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), SetupError> {
        let policy = self.config.setup;
        begin_with_retry::<2, _, _>(&mut self.sensors.air, delay, policy).await?;
        begin_with_retry::<2, _, _>(&mut self.sensors.climate, delay, policy).await?;
        begin_with_retry::<1, _, _>(&mut self.sensors.sound, delay, policy).await?;
        begin_with_retry::<1, _, _>(&mut self.sensors.light, delay, policy).await?;
        Ok(())
    }

    async fn connect_wifi<D: DelayNs>(&mut self, delay: &mut D) -> bool {
        let attempts = self.config.network.connect_attempts.max(1);
        info!("Connecting to WiFi \"{}\"", self.credentials.ssid);

        for attempt in 1..=attempts {
            match self
                .network
                .connect(&self.credentials.ssid, &self.credentials.password)
                .await
            {
                Ok(()) => {
                    info!("WiFi connected");
                    return true;
                }
                Err(e) => warn!("WiFi attempt {}/{} failed: {:?}", attempt, attempts, e),
            }
            if attempt < attempts {
                delay.delay_ms(self.config.network.retry_delay_ms).await;
            }
        }

        error!("WiFi unavailable, uploads will be skipped");
        false
    }

    /// Run one loop iteration at time `now_ms` and return its alert level.
    pub async fn tick(&mut self, now_ms: u64) -> AlertLevel {
        self.display.clear();
        self.alerts.reset();
        let mut cursor = TOP_MARGIN;

        let climate = poll_sensor::<2, _, _>(
            &mut self.sensors.climate,
            &mut self.display,
            &mut self.alerts,
            &mut cursor,
        )
        .await;

        if let Some(climate) = climate {
            let absolute = absolute_humidity_mg_m3(climate.temperature_c, climate.humidity);
            if let Err(e) = self.sensors.air.set_humidity(absolute).await {
                warn!("Humidity compensation skipped: {}", e);
            }
        }

        poll_sensor::<2, _, _>(
            &mut self.sensors.air,
            &mut self.display,
            &mut self.alerts,
            &mut cursor,
        )
        .await;
        poll_sensor::<1, _, _>(
            &mut self.sensors.sound,
            &mut self.display,
            &mut self.alerts,
            &mut cursor,
        )
        .await;
        poll_sensor::<1, _, _>(
            &mut self.sensors.light,
            &mut self.display,
            &mut self.alerts,
            &mut cursor,
        )
        .await;

        self.display.flush();

        let level = self.alerts.level();
        if let Err(e) = self.leds.show(level) {
            error!("Failed to set status LEDs: {:?}", e);
        }

        if self.upload_timer.poll(now_ms) {
            let result = self.upload().await;
            if let Err(e) = &result {
                warn!("Error sending data: {}", e);
            }
            self.last_upload = Some(result);
        }

        if self.baseline_timer.poll(now_ms) {
            if let Err(e) = self.save_baseline().await {
                warn!("Baseline not saved: {}", e);
            }
        }

        level
    }

    /// Tick forever, starting a new tick every configured interval.
    ///
    /// `clock` returns milliseconds since boot.
    pub async fn run<D: DelayNs>(&mut self, clock: impl Fn() -> u64, delay: &mut D) {
        loop {
            self.paced_tick(&clock, delay).await;
        }
    }

    /// Run `ticks` ticks with the same pacing as [`Station::run`].
    pub async fn run_ticks<D: DelayNs>(
        &mut self,
        ticks: u32,
        clock: impl Fn() -> u64,
        delay: &mut D,
    ) {
        for _ in 0..ticks {
            self.paced_tick(&clock, delay).await;
        }
    }

    async fn paced_tick<D: DelayNs>(&mut self, clock: &impl Fn() -> u64, delay: &mut D) {
        let started = clock();
        self.tick(started).await;

        let elapsed = clock().saturating_sub(started);
        let remaining = self.config.tick_interval_ms.saturating_sub(elapsed);
        if remaining > 0 {
            delay
                .delay_ms(u32::try_from(remaining).unwrap_or(u32::MAX))
                .await;
        }
    }

    async fn upload(&mut self) -> Result<u16, UploadError> {
        let payload = UploadPayload::from_readings(
            self.sensors.climate.readings(),
            self.sensors.air.readings(),
            self.sensors.sound.readings(),
            self.sensors.light.readings(),
        )
        .ok_or(UploadError::MissingReadings)?;

        send_sensor_data(
            &mut self.network,
            &self.config.upload.url,
            &self.credentials.auth_header,
            &payload,
        )
        .await
    }

    /// Read the gas sensor baseline and persist it.
    pub async fn save_baseline(&mut self) -> Result<IaqBaseline, AppError> {
        let baseline = self.sensors.air.baseline().await?;

        let mut buf = [0u8; 8];
        let bytes = postcard::to_slice(&baseline, &mut buf)
            .map_err(|e| AppError::Storage(error_details(&e)))?;
        self.store
            .set(BASELINE_KEY, bytes)
            .map_err(|e| AppError::Storage(error_details(&e)))?;

        info!(
            "Saved baseline eCO2: {:#06X}, TVOC: {:#06X}",
            baseline.eco2, baseline.tvoc
        );
        Ok(baseline)
    }

    async fn restore_baseline(&mut self) {
        let mut buf = [0u8; 8];
        let len = match self.store.get(BASELINE_KEY, &mut buf) {
            Ok(Some(len)) => len,
            Ok(None) => {
                info!("No saved baseline, starting calibration from scratch");
                return;
            }
            Err(e) => {
                warn!("Failed to read saved baseline: {:?}", e);
                return;
            }
        };

        let baseline: IaqBaseline = match postcard::from_bytes(&buf[..len.min(buf.len())]) {
            Ok(baseline) => baseline,
            Err(e) => {
                warn!("Saved baseline is corrupt: {:?}", e);
                return;
            }
        };

        match self.sensors.air.set_baseline(baseline).await {
            Ok(()) => info!(
                "Restored baseline eCO2: {:#06X}, TVOC: {:#06X}",
                baseline.eco2, baseline.tvoc
            ),
            Err(e) => warn!("Failed to restore baseline: {}", e),
        }
    }

    pub fn run_state(&self) -> AppRunState {
        self.run_state
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn sensors(&self) -> &SensorSuite<C, A, S, L> {
        &self.sensors
    }

    pub fn display(&self) -> &T {
        &self.display
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    /// Result of the most recent upload attempt, if one was due yet.
    pub fn last_upload(&self) -> Option<&Result<u16, UploadError>> {
        self.last_upload.as_ref()
    }
}

/// Measure one sensor, then log, draw and assess its readings.
///
/// Returns the fresh readings, or `None` if the measurement failed.
async fn poll_sensor<const COUNT: usize, S, T>(
    sensor: &mut S,
    display: &mut T,
    alerts: &mut AlertEvaluator,
    cursor: &mut i32,
) -> Option<S::Readings>
where
    S: Sensor<COUNT>,
    T: TextSurface,
{
    if let Err(e) = sensor.measure().await {
        warn!("Failed to perform {} reading: {}", S::KIND, e);
        return None;
    }
    let readings = sensor.readings()?;

    sensor.print_measurements();
    sensor.display_measurements(display, cursor);
    for (metric, value) in readings.metrics() {
        alerts.evaluate(metric, value, display, cursor);
    }
    Some(readings)
}
