//! Build-time configuration for the ESP32-S3 tracker board

/// Status LED (lit while awake)
pub mod pins {
    pub const LED: u8 = 48;

    /// GNSS receiver UART
    pub const GPS_TX: u8 = 17;
    pub const GPS_RX: u8 = 18;

    /// LoRaWAN modem UART
    pub const MODEM_TX: u8 = 43;
    pub const MODEM_RX: u8 = 44;
}

/// UART configuration
pub mod uart {
    pub const GPS_BAUD_RATE: u32 = 9600;
    pub const MODEM_BAUD_RATE: u32 = 19200;
}

/// Acquisition and duty-cycle timing
pub mod timing {
    /// Give up waiting for a better fix after 5 minutes
    pub const ACQUISITION_TIMEOUT_MS: u64 = 5 * 60 * 1000;

    /// Low-power sleep between cycles (60 minutes)
    pub const SLEEP_INTERVAL_MS: u32 = 60 * 60 * 1000;

    /// Satellite count considered a good fix
    pub const GOOD_FIX_SATELLITES: u8 = 10;

    /// Pause between fix polls while acquiring
    pub const POLL_INTERVAL_MS: u32 = 100;
}

/// LoRaWAN session constants
pub mod lorawan {
    /// Application port used for telemetry uplinks
    pub const UPLINK_PORT: u8 = 2;

    /// Maximum downlink bytes kept per cycle
    pub const MAX_DOWNLINK_LEN: usize = 64;

    /// Maximum uplink payload staged by the modem driver
    pub const MAX_UPLINK_LEN: usize = 64;

    /// Time allowed for the OTAA join exchange
    pub const JOIN_TIMEOUT_MS: u64 = 60_000;

    /// Time allowed for an AT command response
    pub const COMMAND_TIMEOUT_MS: u64 = 2_000;

    /// Time spent listening for a downlink after an uplink (RX1 + RX2 windows)
    pub const RX_WINDOW_MS: u64 = 3_000;
}

/// Telemetry frame layout
pub mod frame {
    /// Frame length in bytes
    pub const FRAME_LEN: usize = 15;

    /// Status byte bit 0: GPS initialised
    pub const STATUS_GPS_INIT: u8 = 0x01;
}

/// Placeholder device status until a fuel gauge and temperature sensor exist
pub mod status_defaults {
    pub const AVAILABILITY_COUNTER: u8 = 0;
    pub const STATE_OF_CHARGE_PCT: u8 = 97;
    pub const TEMPERATURE_C: i8 = 12;
    pub const CHARGE_CYCLES: u16 = 106;
}

/// Debug log output
pub mod logging {
    use log::LevelFilter;

    pub const MAX_LEVEL: LevelFilter = LevelFilter::Info;

    /// Maximum length of a single log line
    pub const MAX_LINE_LEN: usize = 128;

    /// Log lines queued before new ones are dropped
    pub const QUEUE_DEPTH: usize = 16;
}
