//! Acquisition / upload / sleep state machine
//!
//! ```text
//!            good fix, or timeout with a fix
//! Acquiring ────────────────────────────────▶ Uploading
//!    ▲   │                                       │
//!    │   │ timeout, no fix                       │ always
//!    │   ▼                                       ▼
//!    └─ resume ────────────────────────────── Sleeping
//! ```
//!
//! The machine never blocks on the sleep itself. Entering Sleeping yields a
//! [`SleepRequest`] that the scheduler executes before calling
//! [`TelemetryStateMachine::resume`].

use crate::config::timing::SLEEP_INTERVAL_MS;
use crate::frame::{DeviceStatus, FrameCodec, TelemetrySample};
use crate::gps::GpsReceiver;
use crate::lorawan::{Downlink, LoraWanModem, SessionError, TelemetrySession};
use crate::tracker::policy::{AcquisitionPolicy, Decision};

/// Cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Acquiring,
    Uploading,
    Sleeping,
}

/// Request to suspend the whole device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepRequest {
    pub duration_ms: u32,
}

/// Result of one scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick again
    Continue,
    /// Suspend, then call `resume`
    Sleep(SleepRequest),
}

/// What happened during the last upload attempt
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReport {
    pub sample: TelemetrySample,
    pub join: Result<(), SessionError>,
    pub uplink: Result<usize, SessionError>,
    pub downlink: Downlink,
}

/// Tunables injected into the state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerSettings {
    pub policy: AcquisitionPolicy,
    pub sleep_interval_ms: u32,
    pub status: DeviceStatus,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            policy: AcquisitionPolicy::default(),
            sleep_interval_ms: SLEEP_INTERVAL_MS,
            status: DeviceStatus::default(),
        }
    }
}

/// Telemetry cycle state machine
pub struct TelemetryStateMachine {
    state: CycleState,
    settings: TrackerSettings,
    codec: FrameCodec,
    /// Stamped by the first tick of each Acquiring phase
    cycle_start_ms: Option<u64>,
    satellites: u8,
    latest: Option<TelemetrySample>,
    last_report: Option<UploadReport>,
}

impl TelemetryStateMachine {
    /// Create a new state machine in Acquiring
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            state: CycleState::Acquiring,
            settings,
            codec: FrameCodec::new(),
            cycle_start_ms: None,
            satellites: 0,
            latest: None,
            last_report: None,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Satellites in the latest fix of the current cycle
    pub fn satellites(&self) -> u8 {
        self.satellites
    }

    pub fn latest_sample(&self) -> Option<&TelemetrySample> {
        self.latest.as_ref()
    }

    pub fn last_report(&self) -> Option<&UploadReport> {
        self.last_report.as_ref()
    }

    /// Advance the machine by one scheduler tick
    pub async fn tick<G, M>(
        &mut self,
        now_ms: u64,
        gps: &mut G,
        session: &mut TelemetrySession<M>,
    ) -> TickOutcome
    where
        G: GpsReceiver,
        M: LoraWanModem,
    {
        match self.state {
            CycleState::Acquiring => self.acquire(now_ms, gps).await,
            CycleState::Uploading => {
                self.upload(session).await;
                self.enter_sleeping(gps).await
            }
            CycleState::Sleeping => TickOutcome::Sleep(self.sleep_request()),
        }
    }

    /// Wake the receiver after a sleep and start a new cycle
    pub async fn resume<G: GpsReceiver>(&mut self, gps: &mut G) {
        if self.state != CycleState::Sleeping {
            return;
        }
        if let Err(e) = gps.wake().await {
            log::warn!("Tracker: GPS wake failed ({:?})", e);
        }
        self.enter_acquiring();
    }

    fn sleep_request(&self) -> SleepRequest {
        SleepRequest {
            duration_ms: self.settings.sleep_interval_ms,
        }
    }

    fn enter_acquiring(&mut self) {
        log::info!("Tracker: Acquiring fix");
        self.state = CycleState::Acquiring;
        self.cycle_start_ms = None;
        self.satellites = 0;
    }

    async fn enter_sleeping<G: GpsReceiver>(&mut self, gps: &mut G) -> TickOutcome {
        self.state = CycleState::Sleeping;
        if let Err(e) = gps.standby().await {
            log::warn!("Tracker: GPS standby failed ({:?})", e);
        }
        log::info!(
            "Tracker: Sleeping for {} s",
            self.settings.sleep_interval_ms / 1000
        );
        TickOutcome::Sleep(self.sleep_request())
    }

    async fn acquire<G: GpsReceiver>(&mut self, now_ms: u64, gps: &mut G) -> TickOutcome {
        let start = *self.cycle_start_ms.get_or_insert(now_ms);

        if gps.poll_available() {
            let fix = gps.current_fix();
            log::debug!(
                "Tracker: Fix {}, {} alt {} m, {} satellites",
                fix.latitude,
                fix.longitude,
                fix.altitude,
                fix.satellites
            );
            self.satellites = fix.satellites;
            self.latest = Some(fix);
        }

        let elapsed_ms = now_ms.saturating_sub(start);
        match self.settings.policy.decide(elapsed_ms, self.satellites) {
            Decision::KeepWaiting => TickOutcome::Continue,
            Decision::ProceedToUpload => {
                log::info!(
                    "Tracker: Fix with {} satellites after {} s, uploading",
                    self.satellites,
                    elapsed_ms / 1000
                );
                self.state = CycleState::Uploading;
                TickOutcome::Continue
            }
            Decision::AbandonToSleep => {
                log::warn!("Tracker: No fix after {} s, skipping upload", elapsed_ms / 1000);
                self.enter_sleeping(gps).await
            }
        }
    }

    async fn upload<M: LoraWanModem>(&mut self, session: &mut TelemetrySession<M>) {
        let Some(sample) = self.latest else {
            log::warn!("Tracker: No sample to upload");
            return;
        };

        let join = session.ensure_joined().await;
        let frame = self.codec.encode(&sample, &self.settings.status);

        let uplink = session.uplink(&frame).await;
        match &uplink {
            Ok(sent) => log::info!("Tracker: Uplink sent ({} bytes)", sent),
            Err(e) => log::warn!("Tracker: Uplink failed ({:?})", e),
        }

        let downlink = session.drain_downlink();
        if downlink.is_empty() {
            log::info!("Tracker: No downlink received");
        } else {
            log::info!("Tracker: Downlink {:02X?}", downlink.as_slice());
        }

        self.last_report = Some(UploadReport {
            sample,
            join,
            uplink,
            downlink,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::timing::ACQUISITION_TIMEOUT_MS;
    use crate::gps::traits::mock::MockGps;
    use crate::gps::GpsError;
    use crate::lorawan::traits::mock::MockModem;
    use crate::lorawan::{JoinCredentials, ModemError};

    fn session() -> TelemetrySession<MockModem> {
        TelemetrySession::new(MockModem::new(), JoinCredentials::new([0x01; 8], [0x02; 16]))
    }

    fn sleep_outcome() -> TickOutcome {
        TickOutcome::Sleep(SleepRequest {
            duration_ms: SLEEP_INTERVAL_MS,
        })
    }

    #[test]
    fn test_good_fix_uploads_then_sleeps() {
        let mut machine = TelemetryStateMachine::new(TrackerSettings::default());
        let mut gps = MockGps::new();
        let mut session = session();

        futures::executor::block_on(async {
            gps.queue_satellites(3);
            gps.queue_satellites(6);
            gps.queue_satellites(10);

            assert_eq!(machine.tick(0, &mut gps, &mut session).await, TickOutcome::Continue);
            assert_eq!(machine.state(), CycleState::Acquiring);
            assert_eq!(machine.tick(1_000, &mut gps, &mut session).await, TickOutcome::Continue);
            assert_eq!(machine.state(), CycleState::Acquiring);

            // Tenth satellite moves to Uploading on the same tick
            assert_eq!(machine.tick(2_000, &mut gps, &mut session).await, TickOutcome::Continue);
            assert_eq!(machine.state(), CycleState::Uploading);
            assert_eq!(machine.satellites(), 10);
            assert_eq!(machine.latest_sample().map(|s| s.satellites), Some(10));

            assert_eq!(machine.tick(2_100, &mut gps, &mut session).await, sleep_outcome());
            assert_eq!(machine.state(), CycleState::Sleeping);

            let history = session.modem().get_tx_history();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].data.len(), 15);
            assert_eq!(history[0].data[0], 10);
            assert_eq!(gps.standby_calls(), 1);

            let report = machine.last_report().expect("Should record upload");
            assert_eq!(report.join, Ok(()));
            assert_eq!(report.uplink, Ok(15));
        });
    }

    #[test]
    fn test_join_failure_still_sleeps() {
        let mut machine = TelemetryStateMachine::new(TrackerSettings::default());
        let mut gps = MockGps::new();
        let mut session = session();

        futures::executor::block_on(async {
            session.modem().set_next_join_error(ModemError::JoinRejected);
            gps.queue_satellites(12);

            machine.tick(0, &mut gps, &mut session).await;
            assert_eq!(machine.state(), CycleState::Uploading);
            assert_eq!(machine.tick(10, &mut gps, &mut session).await, sleep_outcome());
            assert_eq!(machine.state(), CycleState::Sleeping);

            let report = machine.last_report().unwrap();
            assert_eq!(report.join, Err(SessionError::JoinFailed(ModemError::JoinRejected)));
            assert_eq!(report.uplink, Err(SessionError::NotJoined));
            assert!(session.modem().get_tx_history().is_empty());
        });
    }

    #[test]
    fn test_transmit_failure_still_sleeps() {
        let mut machine = TelemetryStateMachine::new(TrackerSettings::default());
        let mut gps = MockGps::new();
        let mut session = session();

        futures::executor::block_on(async {
            session.modem().set_next_tx_error(ModemError::TransmitFailed);
            gps.queue_satellites(11);

            machine.tick(0, &mut gps, &mut session).await;
            assert_eq!(machine.tick(10, &mut gps, &mut session).await, sleep_outcome());

            let report = machine.last_report().unwrap();
            assert_eq!(report.join, Ok(()));
            assert_eq!(
                report.uplink,
                Err(SessionError::UplinkFailed(ModemError::TransmitFailed))
            );
            // One attempt only
            assert!(session.modem().get_tx_history().is_empty());
            assert_eq!(machine.state(), CycleState::Sleeping);
        });
    }

    #[test]
    fn test_no_fix_skips_upload() {
        let mut machine = TelemetryStateMachine::new(TrackerSettings::default());
        let mut gps = MockGps::new();
        let mut session = session();

        futures::executor::block_on(async {
            let t0 = 50_000;
            assert_eq!(machine.tick(t0, &mut gps, &mut session).await, TickOutcome::Continue);
            assert_eq!(
                machine
                    .tick(t0 + ACQUISITION_TIMEOUT_MS - 1, &mut gps, &mut session)
                    .await,
                TickOutcome::Continue
            );
            assert_eq!(machine.state(), CycleState::Acquiring);

            assert_eq!(
                machine
                    .tick(t0 + ACQUISITION_TIMEOUT_MS, &mut gps, &mut session)
                    .await,
                sleep_outcome()
            );
            assert_eq!(machine.state(), CycleState::Sleeping);
            assert_eq!(session.modem().join_attempts(), 0);
            assert!(machine.last_report().is_none());
            assert!(machine.latest_sample().is_none());
            assert!(gps.is_in_standby());
        });
    }

    #[test]
    fn test_weak_fix_uploads_at_timeout() {
        let mut machine = TelemetryStateMachine::new(TrackerSettings::default());
        let mut gps = MockGps::new();
        let mut session = session();

        futures::executor::block_on(async {
            gps.queue_satellites(4);
            machine.tick(0, &mut gps, &mut session).await;
            assert_eq!(machine.state(), CycleState::Acquiring);

            machine
                .tick(ACQUISITION_TIMEOUT_MS, &mut gps, &mut session)
                .await;
            assert_eq!(machine.state(), CycleState::Uploading);

            machine
                .tick(ACQUISITION_TIMEOUT_MS + 1, &mut gps, &mut session)
                .await;
            assert_eq!(machine.state(), CycleState::Sleeping);
            assert_eq!(session.modem().get_tx_history()[0].data[0], 4);
        });
    }

    #[test]
    fn test_resume_starts_new_cycle() {
        let mut machine = TelemetryStateMachine::new(TrackerSettings::default());
        let mut gps = MockGps::new();
        let mut session = session();

        futures::executor::block_on(async {
            gps.queue_satellites(10);
            machine.tick(0, &mut gps, &mut session).await;
            machine.tick(1, &mut gps, &mut session).await;
            assert_eq!(machine.state(), CycleState::Sleeping);

            machine.resume(&mut gps).await;
            assert_eq!(machine.state(), CycleState::Acquiring);
            assert_eq!(machine.satellites(), 0);
            assert_eq!(gps.wake_calls(), 1);

            // Cycle timer restarts from the first tick after resume
            let t1 = 10_000_000;
            machine.tick(t1, &mut gps, &mut session).await;
            machine
                .tick(t1 + ACQUISITION_TIMEOUT_MS - 1, &mut gps, &mut session)
                .await;
            assert_eq!(machine.state(), CycleState::Acquiring);
        });
    }

    #[test]
    fn test_second_cycle_reuses_session() {
        let mut machine = TelemetryStateMachine::new(TrackerSettings::default());
        let mut gps = MockGps::new();
        let mut session = session();

        futures::executor::block_on(async {
            for cycle in 0..2u64 {
                let t = cycle * 10_000_000;
                gps.queue_satellites(10);
                machine.tick(t, &mut gps, &mut session).await;
                machine.tick(t + 1, &mut gps, &mut session).await;
                machine.resume(&mut gps).await;
            }

            assert_eq!(session.modem().join_attempts(), 1);
            assert_eq!(session.modem().get_tx_history().len(), 2);
        });
    }

    #[test]
    fn test_sleeping_tick_reissues_request() {
        let mut machine = TelemetryStateMachine::new(TrackerSettings::default());
        let mut gps = MockGps::new();
        let mut session = session();

        futures::executor::block_on(async {
            machine.tick(0, &mut gps, &mut session).await;
            machine
                .tick(ACQUISITION_TIMEOUT_MS, &mut gps, &mut session)
                .await;
            assert_eq!(machine.state(), CycleState::Sleeping);

            assert_eq!(machine.tick(0, &mut gps, &mut session).await, sleep_outcome());
            assert_eq!(gps.standby_calls(), 1);
        });
    }

    #[test]
    fn test_standby_failure_absorbed() {
        let mut machine = TelemetryStateMachine::new(TrackerSettings::default());
        let mut gps = MockGps::new();
        let mut session = session();

        futures::executor::block_on(async {
            gps.set_next_standby_error(GpsError::WriteFailed);
            machine.tick(0, &mut gps, &mut session).await;
            let outcome = machine
                .tick(ACQUISITION_TIMEOUT_MS, &mut gps, &mut session)
                .await;
            assert_eq!(outcome, sleep_outcome());
            assert_eq!(machine.state(), CycleState::Sleeping);
        });
    }

    #[test]
    fn test_downlink_recorded() {
        let mut machine = TelemetryStateMachine::new(TrackerSettings::default());
        let mut gps = MockGps::new();
        let mut session = session();

        futures::executor::block_on(async {
            session.modem().queue_downlink(&[0x01, 0xFF]);
            gps.queue_satellites(10);
            machine.tick(0, &mut gps, &mut session).await;
            machine.tick(1, &mut gps, &mut session).await;

            let report = machine.last_report().unwrap();
            assert_eq!(report.downlink.as_slice(), &[0x01, 0xFF]);
        });
    }

    #[test]
    fn test_injected_status_in_frame() {
        let settings = TrackerSettings {
            status: DeviceStatus {
                availability_counter: 3,
                state_of_charge: 55,
                temperature: -4,
                charge_cycles: 7,
            },
            sleep_interval_ms: 1_000,
            ..TrackerSettings::default()
        };
        let mut machine = TelemetryStateMachine::new(settings);
        let mut gps = MockGps::new();
        let mut session = session();

        futures::executor::block_on(async {
            gps.queue_satellites(10);
            machine.tick(0, &mut gps, &mut session).await;
            let outcome = machine.tick(1, &mut gps, &mut session).await;
            assert_eq!(outcome, TickOutcome::Sleep(SleepRequest { duration_ms: 1_000 }));

            let history = session.modem().get_tx_history();
            let sent = &history[0].data;
            assert_eq!(&sent[11..], &[0x07, 55, (-4i8) as u8, 7]);
        });
    }
}
