use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use skyctl_fc::flightplan::UploadState;
use skyctl_fc::guided::{Directive, FinishedFlightInfo, LocationDirective, Orientation};
use skyctl_fc::manual::Limit;
use skyctl_fc::setting::SettingStatus;
use skyctl_fc::upload::ScriptedUploader;
use skyctl_fc::{
    ActivationState, DroneSession, MemoryStore, RecordingTransport, SessionConfig, SessionInput, UploadResult,
    UserAction,
};
use skyctl_proto::event::{FlyingState, FollowBehavior, MoveStatus, PlayingState};
use skyctl_proto::{Command, Event, FollowMode, JsonCodec, MavlinkKind, OrientationMode};

struct Rig {
    session: DroneSession,
    rec: RecordingTransport,
    uploader: ScriptedUploader,
}

impl Rig {
    fn new() -> Self {
        let rec = RecordingTransport::default();
        let uploader = ScriptedUploader::default();
        let session = DroneSession::new(
            &SessionConfig::default(),
            Arc::new(JsonCodec),
            Arc::new(rec.clone()),
            Box::new(MemoryStore::default()),
            Box::new(uploader.clone()),
        );
        Self { session, rec, uploader }
    }

    fn connected() -> Self {
        let mut rig = Self::new();
        rig.session.apply(SessionInput::Connected);
        rig
    }

    fn event(&mut self, ev: Event) {
        self.session.apply(SessionInput::Event(ev));
    }

    fn user(&mut self, action: UserAction) {
        self.session.apply(SessionInput::User(action));
    }

    fn playing(&mut self, state: PlayingState, file: &str) {
        self.event(Event::MavlinkFilePlayingStateChanged {
            state: Some(state),
            filepath: file.to_string(),
            kind: Some(MavlinkKind::FlightPlan),
        });
    }

    fn sent(&self) -> Vec<Command> {
        self.rec.take_acked()
    }

    /// Available, uploaded as `id` and ready to start.
    fn uploaded(&mut self, id: &str) {
        self.event(Event::FlightPlanAvailability { available: 1 });
        self.user(UserAction::UploadFlightPlan { file: PathBuf::from("/plans/survey.mavlink") });
        let token = self.uploader.last_token().unwrap();
        self.session.apply(SessionInput::UploadComplete(UploadResult::success(token, id)));
    }
}

fn start(id: &str) -> Command {
    Command::MavlinkStart { file: id.to_string(), kind: MavlinkKind::FlightPlan }
}

fn move_to(lat: f64, altitude: f64, status: Option<MoveStatus>) -> Event {
    Event::MoveToChanged {
        latitude: lat,
        longitude: 2.35,
        altitude,
        orientation: Some(OrientationMode::ToTarget),
        heading: 0.0,
        status,
    }
}

fn pcmd_seqs(cmds: &[Command]) -> Vec<u32> {
    cmds.iter()
        .filter_map(|c| match c {
            Command::Pcmd { seq, .. } => Some(*seq),
            _ => None,
        })
        .collect()
}

fn location(lat: f64) -> LocationDirective {
    LocationDirective { latitude: lat, longitude: 2.35, altitude: 30.0, orientation: Orientation::ToTarget, speed: None }
}

#[tokio::test(start_paused = true)]
async fn setting_survives_disconnect_and_is_restored() {
    let mut rig = Rig::connected();
    rig.event(Event::MaxTiltChanged { current: 20.0, min: 5.0, max: 35.0 });
    rig.sent();

    rig.user(UserAction::SetLimit { limit: Limit::MaxPitchRoll, value: 28.0 });
    assert_eq!(rig.sent(), vec![Command::SetMaxTilt { value: 28.0 }]);
    assert_eq!(rig.session.manual().limit(Limit::MaxPitchRoll).status(), SettingStatus::Updating);

    rig.session.apply(SessionInput::Disconnected);
    let tilt = rig.session.manual().limit(Limit::MaxPitchRoll);
    assert_eq!(*tilt.confirmed(), 28.0);
    assert_eq!(tilt.status(), SettingStatus::UpToDate);

    // the drone rebooted with its own value
    rig.session.apply(SessionInput::Connected);
    rig.event(Event::MaxTiltChanged { current: 20.0, min: 5.0, max: 35.0 });
    assert_eq!(rig.sent(), vec![Command::SetMaxTilt { value: 28.0 }]);
    assert_eq!(rig.session.manual_capability().state().max_pitch_roll.value, 28.0);

    rig.event(Event::MaxTiltChanged { current: 28.0, min: 5.0, max: 35.0 });
    let tilt = rig.session.manual().limit(Limit::MaxPitchRoll);
    assert_eq!(*tilt.confirmed(), 28.0);
    assert_eq!(tilt.status(), SettingStatus::UpToDate);
    assert!(rig.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn offline_change_is_committed_and_pushed_on_connect() {
    let mut rig = Rig::new();
    rig.user(UserAction::SetLimit { limit: Limit::MaxVerticalSpeed, value: 2.5 });
    assert_eq!(*rig.session.manual().limit(Limit::MaxVerticalSpeed).confirmed(), 2.5);
    assert!(rig.sent().is_empty());

    rig.session.apply(SessionInput::Connected);
    rig.event(Event::MaxVerticalSpeedChanged { current: 1.0, min: 0.5, max: 4.0 });
    assert_eq!(rig.sent(), vec![Command::SetMaxVerticalSpeed { value: 2.5 }]);
}

#[tokio::test(start_paused = true)]
async fn activation_never_confirms_itself() {
    let mut rig = Rig::connected();
    rig.uploaded("p1");
    rig.sent();

    rig.user(UserAction::ActivateFlightPlan { restart: false });
    assert_eq!(rig.sent(), vec![start("p1")]);
    assert_eq!(rig.session.flight_plan().state(), ActivationState::Idle);

    // nothing from the device: still idle after unrelated traffic
    rig.event(Event::MissionItemExecuted { idx: 0 });
    assert_eq!(rig.session.flight_plan().state(), ActivationState::Idle);
    assert_eq!(rig.session.flight_plan_capability().state().state, ActivationState::Idle);
}

#[tokio::test(start_paused = true)]
async fn superseded_directive_keeps_its_own_outcome() {
    let mut rig = Rig::connected();
    rig.event(Event::FlyingStateChanged { state: Some(FlyingState::Hovering) });
    assert_eq!(rig.session.guided().state(), ActivationState::Idle);

    let a = location(48.85);
    let b = location(48.86);
    rig.user(UserAction::MoveTo { directive: Directive::Location(a.clone()) });
    rig.event(Event::MoveToChanged {
        latitude: 48.85,
        longitude: 2.35,
        altitude: 30.0,
        orientation: Some(OrientationMode::ToTarget),
        heading: 0.0,
        status: Some(MoveStatus::Running),
    });
    assert_eq!(rig.session.guided().state(), ActivationState::Active);

    rig.user(UserAction::MoveTo { directive: Directive::Location(b.clone()) });
    assert_eq!(rig.session.guided().current_directive(), Some(&Directive::Location(b.clone())));

    rig.event(Event::MoveToChanged {
        latitude: 48.85,
        longitude: 2.35,
        altitude: 30.0,
        orientation: Some(OrientationMode::ToTarget),
        heading: 0.0,
        status: Some(MoveStatus::Canceled),
    });
    assert_eq!(
        rig.session.guided().latest_finished(),
        Some(&FinishedFlightInfo::Location { directive: a, success: false })
    );
    assert_eq!(rig.session.guided().current_directive(), Some(&Directive::Location(b.clone())));
    assert_eq!(
        rig.session.guided_capability().state().current_directive,
        Some(Directive::Location(b))
    );
}

#[tokio::test(start_paused = true)]
async fn restart_stops_before_starting_same_plan() {
    let mut rig = Rig::connected();
    rig.uploaded("p1");
    rig.user(UserAction::ActivateFlightPlan { restart: false });
    rig.playing(PlayingState::Playing, "p1");
    assert_eq!(rig.session.flight_plan().state(), ActivationState::Active);
    rig.sent();

    rig.user(UserAction::ActivateFlightPlan { restart: true });
    assert_eq!(rig.sent(), vec![Command::MavlinkStop]);

    rig.playing(PlayingState::Stopped, "p1");
    assert_eq!(rig.sent(), vec![start("p1")]);
}

#[tokio::test(start_paused = true)]
async fn upload_while_playing_waits_for_stop() {
    let mut rig = Rig::connected();
    rig.uploaded("p1");
    rig.user(UserAction::ActivateFlightPlan { restart: false });
    rig.playing(PlayingState::Playing, "p1");
    rig.sent();
    let uploads_before = rig.uploader.log().requests.len();

    rig.user(UserAction::UploadFlightPlan { file: PathBuf::from("/plans/next.mavlink") });
    assert_eq!(rig.sent(), vec![Command::MavlinkStop]);
    assert_eq!(rig.uploader.log().requests.len(), uploads_before);
    assert_eq!(rig.session.flight_plan().upload_state(), &UploadState::Uploading);
    assert!(rig.session.flight_plan().is_file_known());

    rig.playing(PlayingState::Stopped, "p1");
    let log = rig.uploader.log();
    assert_eq!(log.requests.len(), uploads_before + 1);
    assert_eq!(log.requests[uploads_before].0, PathBuf::from("/plans/next.mavlink"));
    assert!(rig.session.flight_plan().is_file_known());

    let token = rig.uploader.last_token().unwrap();
    rig.session.apply(SessionInput::UploadComplete(UploadResult::success(token, "p2")));
    assert_eq!(rig.session.flight_plan().upload_state(), &UploadState::Uploaded("p2".into()));
}

#[tokio::test(start_paused = true)]
async fn upload_activate_pause_and_restart() {
    let mut rig = Rig::connected();
    rig.event(Event::FlightPlanAvailability { available: 1 });

    // (1)
    rig.user(UserAction::UploadFlightPlan { file: PathBuf::from("/plans/survey.mavlink") });
    assert_eq!(rig.session.flight_plan().upload_state(), &UploadState::Uploading);
    let token = rig.uploader.last_token().unwrap();
    rig.session.apply(SessionInput::UploadComplete(UploadResult::success(token, "p1")));
    assert_eq!(rig.session.flight_plan().upload_state(), &UploadState::Uploaded("p1".into()));
    assert!(rig.session.flight_plan().reasons().is_empty());
    rig.sent();

    rig.user(UserAction::ActivateFlightPlan { restart: false });
    assert_eq!(rig.sent(), vec![start("p1")]);
    rig.playing(PlayingState::Playing, "p1");
    assert_eq!(rig.session.flight_plan().state(), ActivationState::Active);

    // (2)
    rig.playing(PlayingState::Paused, "p1");
    assert_eq!(rig.session.flight_plan().state(), ActivationState::Idle);
    assert!(rig.session.flight_plan().is_paused());
    assert!(rig.session.flight_plan_capability().state().is_paused);
    rig.user(UserAction::ActivateFlightPlan { restart: false });
    assert_eq!(rig.sent(), vec![start("p1")]);

    // (3) still paused on the device
    rig.user(UserAction::ActivateFlightPlan { restart: true });
    assert_eq!(rig.sent(), vec![Command::MavlinkStop]);
    rig.playing(PlayingState::Stopped, "p1");
    assert_eq!(rig.sent(), vec![start("p1")]);
}

#[tokio::test(start_paused = true)]
async fn failed_upload_blocks_activation() {
    let mut rig = Rig::connected();
    rig.event(Event::FlightPlanAvailability { available: 1 });
    rig.user(UserAction::UploadFlightPlan { file: PathBuf::from("/plans/bad.mavlink") });
    let token = rig.uploader.last_token().unwrap();
    rig.session.apply(SessionInput::UploadComplete(UploadResult::failure(token, Some(500))));

    assert_eq!(rig.session.flight_plan().upload_state(), &UploadState::Failed);
    assert_eq!(rig.session.flight_plan().state(), ActivationState::Unavailable);
    rig.sent();
    rig.user(UserAction::ActivateFlightPlan { restart: true });
    assert!(rig.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn disconnect_clears_directives_and_flight_plan() {
    let mut rig = Rig::connected();
    rig.event(Event::FlyingStateChanged { state: Some(FlyingState::Flying) });
    rig.user(UserAction::MoveTo { directive: Directive::Location(location(48.85)) });
    rig.user(UserAction::UploadFlightPlan { file: PathBuf::from("/plans/survey.mavlink") });
    let token = rig.uploader.last_token().unwrap();

    rig.session.apply(SessionInput::Disconnected);
    assert_eq!(rig.session.guided().current_directive(), None);
    assert_eq!(rig.session.guided().state(), ActivationState::Unavailable);
    assert_eq!(rig.session.flight_plan().upload_state(), &UploadState::None);
    assert_eq!(rig.uploader.log().canceled, vec![token]);
    assert!(!rig.session.is_piloting_armed());

    // a completion racing the teardown is stale
    rig.session.apply(SessionInput::UploadComplete(UploadResult::success(token, "late")));
    assert_eq!(rig.session.flight_plan().upload_state(), &UploadState::None);
}

#[tokio::test(start_paused = true)]
async fn declined_activation_leaves_nothing_behind() {
    let mut rig = Rig::connected();
    rig.event(Event::FlyingStateChanged { state: Some(FlyingState::Hovering) });
    rig.uploaded("p1");
    assert!(rig.session.perform(UserAction::ActivateFlightPlan { restart: false }));
    rig.playing(PlayingState::Playing, "p1");
    assert_eq!(rig.session.flight_plan().state(), ActivationState::Active);
    rig.sent();

    // the pause that would hand over to guided cannot be sent
    rig.rec.set_ready(false);
    assert!(!rig.session.perform(UserAction::MoveTo { directive: Directive::Location(location(48.85)) }));
    assert_eq!(rig.session.guided().current_directive(), None);
    rig.rec.set_ready(true);

    rig.playing(PlayingState::Stopped, "p1");
    let sent = rig.sent();
    assert!(!sent.iter().any(|c| matches!(c, Command::MoveTo { .. })), "sent {sent:?}");
    assert_eq!(rig.session.guided().current_directive(), None);
    assert_eq!(rig.session.current_interface(), skyctl_fc::policy::ItfKind::Manual);
}

#[tokio::test(start_paused = true)]
async fn perform_reports_whether_the_call_was_taken() {
    let mut rig = Rig::connected();
    // not flying: guided is unavailable
    assert!(!rig.session.perform(UserAction::MoveTo { directive: Directive::Location(location(48.85)) }));
    assert!(!rig.session.perform(UserAction::ActivateFlightPlan { restart: false }));
    assert!(!rig.session.perform(UserAction::ActivateManual));
    assert!(rig.sent().is_empty());

    rig.event(Event::MaxTiltChanged { current: 20.0, min: 5.0, max: 35.0 });
    assert!(rig.session.perform(UserAction::SetLimit { limit: Limit::MaxPitchRoll, value: 25.0 }));
    assert!(!rig.session.perform(UserAction::SetLimit { limit: Limit::MaxPitchRoll, value: 25.0 }));
    assert!(rig.session.perform(UserAction::SetPitch { value: 40 }));
}

#[tokio::test(start_paused = true)]
async fn newer_directive_tracked_when_older_never_reported() {
    let mut rig = Rig::connected();
    rig.event(Event::FlyingStateChanged { state: Some(FlyingState::Hovering) });
    let a = location(48.85);
    let b = location(48.86);
    assert!(rig.session.perform(UserAction::MoveTo { directive: Directive::Location(a) }));
    assert!(rig.session.perform(UserAction::MoveTo { directive: Directive::Location(b.clone()) }));

    rig.event(move_to(48.86, 30.0, Some(MoveStatus::Running)));
    assert_eq!(rig.session.guided().state(), ActivationState::Active);
    assert_eq!(rig.session.guided().current_directive(), Some(&Directive::Location(b.clone())));

    rig.event(move_to(48.86, 30.0, Some(MoveStatus::Done)));
    assert_eq!(rig.session.guided().state(), ActivationState::Idle);
    assert_eq!(rig.session.guided().current_directive(), None);
    assert_eq!(
        rig.session.guided().latest_finished(),
        Some(&FinishedFlightInfo::Location { directive: b, success: true })
    );

    // the next move is tracked from a clean slate
    let c = location(48.87);
    assert!(rig.session.perform(UserAction::MoveTo { directive: Directive::Location(c.clone()) }));
    rig.event(move_to(48.87, 30.0, Some(MoveStatus::Running)));
    assert_eq!(rig.session.guided().state(), ActivationState::Active);
    assert_eq!(rig.session.guided().current_directive(), Some(&Directive::Location(c)));
}

#[tokio::test(start_paused = true)]
async fn move_update_without_status_still_refreshes_directive() {
    let mut rig = Rig::connected();
    rig.event(Event::FlyingStateChanged { state: Some(FlyingState::Hovering) });
    rig.user(UserAction::MoveTo { directive: Directive::Location(location(48.85)) });
    rig.event(move_to(48.85, 30.0, Some(MoveStatus::Running)));

    rig.event(move_to(48.85, 42.0, None));
    let mut expected = location(48.85);
    expected.altitude = 42.0;
    assert_eq!(rig.session.guided().current_directive(), Some(&Directive::Location(expected.clone())));
    assert_eq!(rig.session.guided_capability().state().current_directive, Some(Directive::Location(expected)));
    assert_eq!(rig.session.guided().state(), ActivationState::Active);
}

#[tokio::test(start_paused = true)]
async fn pcmd_sequence_continues_across_interface_switches() {
    let mut rig = Rig::connected();
    rig.event(Event::FlyingStateChanged { state: Some(FlyingState::Hovering) });
    rig.event(Event::FollowMeModeInfo {
        mode: Some(FollowMode::LookAt),
        missing_requirements: 0x1ff,
        improvements: 0x1ff,
    });
    tokio::time::sleep(Duration::from_millis(175)).await;
    let mut seqs = pcmd_seqs(&rig.rec.take_commands());

    rig.event(Event::FollowMeState { mode: Some(FollowMode::LookAt), behavior: Some(FollowBehavior::LookAt) });
    assert_eq!(rig.session.current_interface(), skyctl_fc::policy::ItfKind::LookAt);
    tokio::time::sleep(Duration::from_millis(175)).await;
    seqs.extend(pcmd_seqs(&rig.rec.take_commands()));

    rig.event(Event::FollowMeState { mode: Some(FollowMode::None), behavior: Some(FollowBehavior::Idle) });
    assert_eq!(rig.session.current_interface(), skyctl_fc::policy::ItfKind::Manual);
    tokio::time::sleep(Duration::from_millis(175)).await;
    seqs.extend(pcmd_seqs(&rig.rec.take_commands()));

    assert!(seqs.len() >= 9, "seqs {seqs:?}");
    assert!(seqs.windows(2).all(|w| w[1] == w[0] + 1), "seqs {seqs:?}");
}

#[tokio::test(start_paused = true)]
async fn preset_restored_once_transport_is_back() {
    let mut store = MemoryStore::default();
    store.presets.insert("manualCopter.maxPitchRoll".into(), serde_json::json!(26.0));
    let rec = RecordingTransport::default();
    let mut session = DroneSession::new(
        &SessionConfig::default(),
        Arc::new(JsonCodec),
        Arc::new(rec.clone()),
        Box::new(store),
        Box::new(ScriptedUploader::default()),
    );
    session.apply(SessionInput::Connected);
    rec.take_acked();

    rec.set_ready(false);
    session.apply(SessionInput::Event(Event::MaxTiltChanged { current: 20.0, min: 5.0, max: 35.0 }));
    assert_eq!(*session.manual().limit(Limit::MaxPitchRoll).value(), 20.0);

    rec.set_ready(true);
    session.apply(SessionInput::Event(Event::MaxTiltChanged { current: 20.0, min: 5.0, max: 35.0 }));
    assert_eq!(rec.take_acked(), vec![Command::SetMaxTilt { value: 26.0 }]);
    assert_eq!(*session.manual().limit(Limit::MaxPitchRoll).value(), 26.0);
}
