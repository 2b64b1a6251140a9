pub mod codec;

pub use codec::{DeviceStatus, FrameCodec, TelemetryFrame, TelemetrySample};
