#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use core::fmt::Display;

use airsense_core::config::StationConfig;
use airsense_core::display_manager::DisplayManager;
use airsense_core::sensors::{Dht20Sensor, Max9814Sensor, PhotoresistorSensor, Sgp30Sensor};
use airsense_core::station::{SensorSuite, Station};
use airsense_firmware::hardware;
use airsense_firmware::net::{StationNetwork, net_task};
use airsense_firmware::store::FirmwareStore;
use embassy_executor::Spawner;
use embassy_net::StackResources;
use embassy_time::{Delay, Instant};
use esp_hal::clock::CpuClock;
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use log::{LevelFilter, error, info};
use static_cell::StaticCell;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Sockets for DHCP, DNS and the upload connection.
const STACK_SOCKETS: usize = 3;

/// Report `reason` every few seconds, forever.
fn halt(reason: impl Display) -> ! {
    let delay = esp_hal::delay::Delay::new();
    loop {
        error!("{}", reason);
        delay.delay_millis(5000);
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!(LevelFilter::Info);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);
    // The framebuffer does not fit in internal RAM.
    esp_alloc::psram_allocator!(peripherals.PSRAM, esp_hal::psram);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);
    info!("Embassy initialized");

    // --- WiFi -----------------------------------------------------------
    static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
    let radio = esp_radio::init()
        .unwrap_or_else(|e| halt(format_args!("Failed to initialize radio: {:?}", e)));
    let radio = RADIO.init(radio);
    let (controller, interfaces) =
        esp_radio::wifi::new(radio, peripherals.WIFI, Default::default())
            .unwrap_or_else(|e| halt(format_args!("Failed to initialize WiFi: {:?}", e)));

    static RESOURCES: StaticCell<StackResources<STACK_SOCKETS>> = StaticCell::new();
    let rng = Rng::new();
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::new()),
        seed,
    );
    match net_task(runner) {
        Ok(token) => spawner.spawn(token),
        Err(e) => halt(format_args!("Failed to spawn network task: {:?}", e)),
    }

    // --- Sensors --------------------------------------------------------
    let station_config = StationConfig::default();

    let i2c = hardware::create_i2c_bus(peripherals.I2C0, peripherals.GPIO8, peripherals.GPIO9)
        .unwrap_or_else(|e| halt(e));
    let (climate_i2c, air_i2c) = hardware::share_i2c_bus(i2c);

    let mut sound = Max9814Sensor::new(
        hardware::microphone(peripherals.ADC1, peripherals.GPIO2),
        Delay,
    );
    let mut light = PhotoresistorSensor::new(
        hardware::photoresistor(peripherals.ADC2, peripherals.GPIO12),
        Delay,
    );
    station_config.calibration.apply(&mut sound, &mut light);

    let sensors = SensorSuite {
        climate: Dht20Sensor::new(climate_i2c, Delay),
        air: Sgp30Sensor::new(air_i2c, Delay),
        sound,
        light,
    };

    // --- Display and LEDs -----------------------------------------------
    let display = hardware::init_display(
        peripherals.SPI2,
        peripherals.GPIO18,
        peripherals.GPIO17,
        peripherals.GPIO16,
        peripherals.GPIO15,
    )
    .unwrap_or_else(|e| halt(e));
    let leds = hardware::status_leds(peripherals.GPIO4, peripherals.GPIO5, peripherals.GPIO6);

    // --- Station --------------------------------------------------------
    let mut station = Station::new(
        station_config,
        sensors,
        DisplayManager::new(display),
        leds,
        StationNetwork::new(controller, stack),
        FirmwareStore::new(),
    );

    if let Err(e) = station.setup(&mut Delay).await {
        halt(e);
    }

    loop {
        station
            .run(|| Instant::now().as_millis(), &mut Delay)
            .await;
    }
}
