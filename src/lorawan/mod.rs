pub mod at;
pub mod credentials;
pub mod session;
pub mod traits;

// UART driver depends on embassy-time, only available with embedded feature
#[cfg(feature = "embedded")]
pub mod driver;

pub use credentials::{CredentialsError, JoinCredentials};
pub use session::{Downlink, SessionError, SessionState, TelemetrySession};
pub use traits::{LoraWanModem, ModemError};
