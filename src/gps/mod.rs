pub mod nmea;
pub mod traits;
pub mod ubx;

// UART glue depends on embassy/esp-hal, only available with embedded feature
#[cfg(feature = "embedded")]
pub mod driver;

pub use nmea::{parse_gga, NmeaError, SentenceAccumulator};
pub use traits::{GpsError, GpsReceiver};
