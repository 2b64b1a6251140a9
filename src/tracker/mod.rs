pub mod machine;
pub mod policy;
pub mod runner;

pub use machine::{
    CycleState, SleepRequest, TelemetryStateMachine, TickOutcome, TrackerSettings, UploadReport,
};
pub use policy::{AcquisitionPolicy, Decision};
pub use runner::{Timebase, Tracker};
