#![no_std]
#![no_main]

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use embassy_executor::Spawner;
use embassy_time::{Duration, Instant, Timer};
use esp_backtrace as _;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::rtc_cntl::sleep::TimerWakeupSource;
use esp_hal::rtc_cntl::Rtc;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::{Config as UartConfig, Uart, UartRx, UartTx};
use esp_hal::usb_serial_jtag::{UsbSerialJtag, UsbSerialJtagTx};
use esp_hal::Async;
use static_cell::StaticCell;

use lora_gps_tracker_firmware::config;
use lora_gps_tracker_firmware::debug;
use lora_gps_tracker_firmware::gps::driver::{gps_reader, UbloxGps};
use lora_gps_tracker_firmware::lorawan::driver::AtModem;
use lora_gps_tracker_firmware::lorawan::{JoinCredentials, TelemetrySession};
use lora_gps_tracker_firmware::tracker::{
    TelemetryStateMachine, Timebase, Tracker, TrackerSettings,
};

/// Type alias for the GNSS receiver handle
type Gps = UbloxGps<UartTx<'static, Async>>;

/// Type alias for the LoRaWAN modem driver
type Modem = AtModem<Uart<'static, Async>>;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

/// Board clock and light sleep
///
/// The status LED (active low) is lit while the device is awake.
struct BoardTimebase {
    rtc: Rtc<'static>,
    led: Output<'static>,
}

impl Timebase for BoardTimebase {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }

    async fn delay_ms(&mut self, ms: u32) {
        Timer::after(Duration::from_millis(u64::from(ms))).await;
    }

    async fn suspend_ms(&mut self, ms: u32) {
        let wakeup = TimerWakeupSource::new(core::time::Duration::from_millis(u64::from(ms)));

        self.led.set_high(); // LED off
        self.rtc.sleep_light(&[&wakeup]);
        self.led.set_low(); // LED on

        log::info!("Board: Woke after {} s", ms / 1000);
    }
}

#[esp_hal::main]
fn main() -> ! {
    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Turn on LED (active low, config::pins::LED)
    let led = Output::new(peripherals.GPIO48, Level::Low, OutputConfig::default());

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Configure USB Serial JTAG for debug output
    let usb_serial = UsbSerialJtag::new(peripherals.USB_DEVICE).into_async();
    let (_usb_rx, usb_tx) = usb_serial.split();
    debug::init();

    // GNSS receiver: NMEA in, UBX power commands out (pins per config::pins)
    let gps_uart = Uart::new(
        peripherals.UART1,
        UartConfig::default().with_baudrate(config::uart::GPS_BAUD_RATE),
    )
    .unwrap()
    .with_tx(peripherals.GPIO17)
    .with_rx(peripherals.GPIO18)
    .into_async();
    let (gps_rx, gps_tx) = gps_uart.split();

    // LoRaWAN modem
    let modem_uart = Uart::new(
        peripherals.UART2,
        UartConfig::default().with_baudrate(config::uart::MODEM_BAUD_RATE),
    )
    .unwrap()
    .with_tx(peripherals.GPIO43)
    .with_rx(peripherals.GPIO44)
    .into_async();

    // Keys are provisioned at build time
    let credentials = JoinCredentials::from_hex(env!("LORAWAN_APP_EUI"), env!("LORAWAN_APP_KEY"))
        .expect("Invalid LoRaWAN credentials");

    let timebase = BoardTimebase {
        rtc: Rtc::new(peripherals.LPWR),
        led,
    };

    // Create and run the embassy executor
    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(async_main(
            spawner,
            usb_tx,
            gps_rx,
            gps_tx,
            modem_uart,
            credentials,
            timebase,
        ));
    })
}

#[embassy_executor::task]
async fn async_main(
    spawner: Spawner,
    usb_tx: UsbSerialJtagTx<'static, Async>,
    gps_rx: UartRx<'static, Async>,
    gps_tx: UartTx<'static, Async>,
    modem_uart: Uart<'static, Async>,
    credentials: JoinCredentials,
    timebase: BoardTimebase,
) {
    spawner.spawn(debug_writer_task(usb_tx)).unwrap();
    spawner.spawn(gps_reader_task(gps_rx)).unwrap();

    log::info!("Boot: {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let mut modem = AtModem::new(modem_uart);
    if let Err(e) = modem.init().await {
        // Joining will fail and be retried every cycle
        log::error!("Boot: Modem init failed ({:?})", e);
    }

    let tracker = Tracker::new(
        TelemetryStateMachine::new(TrackerSettings::default()),
        UbloxGps::new(gps_tx),
        TelemetrySession::new(modem, credentials),
        timebase,
    );
    spawner.spawn(tracker_task(tracker)).unwrap();
}

/// Task that drains the log queue to USB serial
#[embassy_executor::task]
async fn debug_writer_task(usb_tx: UsbSerialJtagTx<'static, Async>) {
    debug::debug_writer_task(usb_tx).await;
}

/// Task that parses NMEA from the GNSS receiver
#[embassy_executor::task]
async fn gps_reader_task(gps_rx: UartRx<'static, Async>) {
    gps_reader(gps_rx).await;
}

/// Task that runs the acquire / upload / sleep cycle
#[embassy_executor::task]
async fn tracker_task(mut tracker: Tracker<Gps, Modem, BoardTimebase>) {
    tracker.run().await;
}
