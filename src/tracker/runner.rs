//! Cooperative scheduler for the telemetry cycle
//!
//! Ticks the state machine, pacing acquisition with short delays and
//! carrying out sleep requests through the platform [`Timebase`].

use crate::config::timing::POLL_INTERVAL_MS;
use crate::gps::GpsReceiver;
use crate::lorawan::{LoraWanModem, TelemetrySession};
use crate::tracker::machine::{CycleState, TelemetryStateMachine, TickOutcome};
use core::future::Future;

/// Platform clock and power control
pub trait Timebase {
    /// Monotonic milliseconds since boot
    fn now_ms(&self) -> u64;

    /// Wait without lowering the power state
    fn delay_ms(&mut self, ms: u32) -> impl Future<Output = ()>;

    /// Suspend the whole device for `ms` and return once woken
    fn suspend_ms(&mut self, ms: u32) -> impl Future<Output = ()>;
}

/// Telemetry tracker: state machine plus the hardware it drives
pub struct Tracker<G, M, T>
where
    G: GpsReceiver,
    M: LoraWanModem,
    T: Timebase,
{
    machine: TelemetryStateMachine,
    gps: G,
    session: TelemetrySession<M>,
    timebase: T,
}

impl<G, M, T> Tracker<G, M, T>
where
    G: GpsReceiver,
    M: LoraWanModem,
    T: Timebase,
{
    pub fn new(
        machine: TelemetryStateMachine,
        gps: G,
        session: TelemetrySession<M>,
        timebase: T,
    ) -> Self {
        Self {
            machine,
            gps,
            session,
            timebase,
        }
    }

    pub fn machine(&self) -> &TelemetryStateMachine {
        &self.machine
    }

    pub fn gps(&self) -> &G {
        &self.gps
    }

    pub fn session(&self) -> &TelemetrySession<M> {
        &self.session
    }

    pub fn timebase(&self) -> &T {
        &self.timebase
    }

    /// Run one tick and whatever waiting it asks for
    ///
    /// Returns the state after the step.
    pub async fn step(&mut self) -> CycleState {
        let now_ms = self.timebase.now_ms();
        let outcome = self
            .machine
            .tick(now_ms, &mut self.gps, &mut self.session)
            .await;

        match outcome {
            TickOutcome::Continue => {
                // Uploading runs on the very next tick
                if self.machine.state() == CycleState::Acquiring {
                    self.timebase.delay_ms(POLL_INTERVAL_MS).await;
                }
            }
            TickOutcome::Sleep(request) => {
                self.timebase.suspend_ms(request.duration_ms).await;
                self.machine.resume(&mut self.gps).await;
            }
        }

        self.machine.state()
    }

    /// Run the telemetry cycle forever
    pub async fn run(&mut self) {
        log::info!("Tracker: Started");
        loop {
            self.step().await;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockTimebase;
    use super::*;
    use crate::config::timing::{ACQUISITION_TIMEOUT_MS, SLEEP_INTERVAL_MS};
    use crate::gps::traits::mock::MockGps;
    use crate::lorawan::traits::mock::MockModem;
    use crate::lorawan::JoinCredentials;
    use crate::tracker::machine::TrackerSettings;

    fn tracker() -> Tracker<MockGps, MockModem, MockTimebase> {
        Tracker::new(
            TelemetryStateMachine::new(TrackerSettings::default()),
            MockGps::new(),
            TelemetrySession::new(MockModem::new(), JoinCredentials::new([0x01; 8], [0x02; 16])),
            MockTimebase::new(),
        )
    }

    #[test]
    fn test_acquiring_polls_with_delay() {
        let mut tracker = tracker();

        futures::executor::block_on(async {
            assert_eq!(tracker.step().await, CycleState::Acquiring);
            assert_eq!(tracker.step().await, CycleState::Acquiring);

            assert_eq!(tracker.timebase().delays(), 2);
            assert_eq!(tracker.timebase().now_ms(), 2 * u64::from(POLL_INTERVAL_MS));
            assert!(tracker.timebase().suspends().is_empty());
        });
    }

    #[test]
    fn test_full_cycle_with_good_fix() {
        let mut tracker = tracker();

        futures::executor::block_on(async {
            tracker.gps().queue_satellites(10);

            // Fix arrives, upload is next without a delay
            assert_eq!(tracker.step().await, CycleState::Uploading);
            assert_eq!(tracker.timebase().delays(), 0);

            // Upload, sleep, wake into a new cycle
            assert_eq!(tracker.step().await, CycleState::Acquiring);
            assert_eq!(tracker.timebase().suspends(), &[SLEEP_INTERVAL_MS]);
            assert_eq!(tracker.gps().standby_calls(), 1);
            assert_eq!(tracker.gps().wake_calls(), 1);
            assert_eq!(tracker.session().modem().get_tx_history().len(), 1);
        });
    }

    #[test]
    fn test_timeout_sleeps_without_upload() {
        let mut tracker = tracker();
        let polls = ACQUISITION_TIMEOUT_MS / u64::from(POLL_INTERVAL_MS);

        futures::executor::block_on(async {
            for _ in 0..polls {
                assert_eq!(tracker.step().await, CycleState::Acquiring);
            }
            assert!(tracker.timebase().suspends().is_empty());

            // Elapsed time reaches the timeout on this tick
            assert_eq!(tracker.step().await, CycleState::Acquiring);
            assert_eq!(tracker.timebase().suspends(), &[SLEEP_INTERVAL_MS]);
            assert_eq!(tracker.session().modem().join_attempts(), 0);
            assert!(tracker.session().modem().get_tx_history().is_empty());
        });
    }

    #[test]
    fn test_new_cycle_restarts_timeout() {
        let mut tracker = tracker();

        futures::executor::block_on(async {
            tracker.gps().queue_satellites(10);
            tracker.step().await;
            tracker.step().await;
            assert_eq!(tracker.timebase().suspends().len(), 1);

            // Clock is far past the first cycle's start; the new cycle must not time out at once
            assert_eq!(tracker.step().await, CycleState::Acquiring);
            assert_eq!(tracker.step().await, CycleState::Acquiring);
            assert_eq!(tracker.timebase().suspends().len(), 1);
        });
    }
}
