use serde::{Deserialize, Serialize};
use skyctl_proto::event::{FlyingState, MoveByError, MoveStatus};
use skyctl_proto::{Command, MoveSpeed, OrientationMode, UNKNOWN_COORDINATE};
use tracing::{debug, info};

use crate::activation::{Activation, ActivationState, Transition};
use crate::link::Link;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidedReason {
    DroneNotFlying,
}

/// Heading behaviour during a location move. Headings are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "heading", rename_all = "snake_case")]
pub enum Orientation {
    None,
    ToTarget,
    HeadingStart(f32),
    HeadingDuring(f32),
}

impl Orientation {
    fn to_wire(self) -> (OrientationMode, f32) {
        match self {
            Orientation::None => (OrientationMode::None, 0.0),
            Orientation::ToTarget => (OrientationMode::ToTarget, 0.0),
            Orientation::HeadingStart(h) => (OrientationMode::HeadingStart, h),
            Orientation::HeadingDuring(h) => (OrientationMode::HeadingDuring, h),
        }
    }

    fn from_wire(mode: OrientationMode, heading: f32) -> Self {
        match mode {
            OrientationMode::None => Orientation::None,
            OrientationMode::ToTarget => Orientation::ToTarget,
            OrientationMode::HeadingStart => Orientation::HeadingStart(heading),
            OrientationMode::HeadingDuring => Orientation::HeadingDuring(heading),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDirective {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub orientation: Orientation,
    #[serde(default)]
    pub speed: Option<MoveSpeed>,
}

/// Displacement in meters relative to the drone, heading change in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeDirective {
    pub forward: f32,
    pub right: f32,
    pub down: f32,
    pub heading: f32,
    #[serde(default)]
    pub speed: Option<MoveSpeed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    Location(LocationDirective),
    Relative(RelativeDirective),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MoveKind {
    Location,
    Relative,
}

impl Directive {
    fn kind(&self) -> MoveKind {
        match self {
            Directive::Location(_) => MoveKind::Location,
            Directive::Relative(_) => MoveKind::Relative,
        }
    }

    fn command(&self) -> Command {
        match self {
            Directive::Location(d) => {
                let (orientation, heading) = d.orientation.to_wire();
                Command::MoveTo {
                    latitude: d.latitude,
                    longitude: d.longitude,
                    altitude: d.altitude,
                    orientation,
                    heading,
                    speed: d.speed,
                }
            }
            Directive::Relative(d) => Command::MoveBy {
                dx: d.forward,
                dy: d.right,
                dz: d.down,
                dpsi: d.heading.to_radians(),
                speed: d.speed,
            },
        }
    }
}

/// Outcome of a directive once the device reports it over.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FinishedFlightInfo {
    Location {
        directive: LocationDirective,
        success: bool,
    },
    Relative {
        directive: RelativeDirective,
        success: bool,
        actual_forward: f32,
        actual_right: f32,
        actual_down: f32,
        actual_heading: f32,
    },
}

impl FinishedFlightInfo {
    pub fn success(&self) -> bool {
        match self {
            FinishedFlightInfo::Location { success, .. } | FinishedFlightInfo::Relative { success, .. } => *success,
        }
    }
}

/// Snapshot handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuidedView {
    pub state: ActivationState,
    pub reasons: Vec<GuidedReason>,
    pub current_directive: Option<Directive>,
    pub latest_finished_flight_info: Option<FinishedFlightInfo>,
}

impl GuidedView {
    pub fn update_state(&mut self, state: ActivationState) -> &mut Self {
        self.state = state;
        self
    }

    pub fn update_reasons(&mut self, reasons: impl IntoIterator<Item = GuidedReason>) -> &mut Self {
        self.reasons = reasons.into_iter().collect();
        self
    }

    pub fn update_current_directive(&mut self, directive: Option<&Directive>) -> &mut Self {
        self.current_directive = directive.cloned();
        self
    }

    pub fn update_latest_finished(&mut self, info: Option<&FinishedFlightInfo>) -> &mut Self {
        self.latest_finished_flight_info = info.cloned();
        self
    }
}

/// Tracks commanded moves from request to terminal event.
///
/// The device only ever reports on the move it is flying, so events are
/// matched against the current directive. A directive replaced before its
/// end was reported is kept as `superseded` until an event names it or the
/// current move finishes.
pub struct GuidedTracker {
    activation: Activation<GuidedReason>,
    current: Option<Directive>,
    superseded: Option<Directive>,
    /// Zero move sent to cancel a relative move; its end is not an outcome.
    cancel_pending: bool,
    latest_finished: Option<FinishedFlightInfo>,
}

impl Default for GuidedTracker {
    fn default() -> Self {
        Self {
            activation: Activation::new("guided", false),
            current: None,
            superseded: None,
            cancel_pending: false,
            latest_finished: None,
        }
    }
}

impl GuidedTracker {
    pub fn state(&self) -> ActivationState {
        self.activation.state()
    }

    pub fn activation(&self) -> &Activation<GuidedReason> {
        &self.activation
    }

    pub fn current_directive(&self) -> Option<&Directive> {
        self.current.as_ref()
    }

    pub fn latest_finished(&self) -> Option<&FinishedFlightInfo> {
        self.latest_finished.as_ref()
    }

    pub fn sync_into(&self, view: &mut GuidedView) {
        view.update_state(self.state())
            .update_reasons(self.activation.reasons().iter().copied())
            .update_current_directive(self.current_directive())
            .update_latest_finished(self.latest_finished());
    }

    pub fn view(&self) -> GuidedView {
        let mut view = GuidedView {
            state: self.state(),
            reasons: Vec::new(),
            current_directive: None,
            latest_finished_flight_info: None,
        };
        self.sync_into(&mut view);
        view
    }

    pub fn can_start(&self) -> bool {
        matches!(self.state(), ActivationState::Idle | ActivationState::Active)
    }

    pub fn on_connected(&mut self) {
        self.activation.set_connected(true);
        // not flying until the device says otherwise
        self.activation.set_reason(GuidedReason::DroneNotFlying, true);
    }

    pub fn on_disconnected(&mut self) {
        self.current = None;
        self.superseded = None;
        self.cancel_pending = false;
        self.activation.set_connected(false);
    }

    pub fn on_flying_state(&mut self, state: FlyingState) {
        let flying = matches!(state, FlyingState::Hovering | FlyingState::Flying);
        let t = self.activation.set_reason(GuidedReason::DroneNotFlying, !flying);
        if matches!(t, Some(Transition { to: ActivationState::Unavailable, .. })) {
            self.abort_all();
        }
    }

    /// Sends the move and makes it current right away. ACTIVE follows the
    /// device's first progress report for it.
    pub fn start(&mut self, directive: Directive, link: &Link) -> bool {
        if !self.can_start() {
            debug!("guided move declined in {:?}", self.state());
            return false;
        }
        if !link.send_command(&directive.command()) {
            return false;
        }
        info!("guided move started: {:?}", directive);
        if let Some(previous) = self.current.replace(directive) {
            debug!("superseding {:?}", previous);
            self.superseded = Some(previous);
        }
        true
    }

    /// Cancels the current move. Its terminal event still gets recorded.
    pub fn stop(&mut self, link: &Link) -> bool {
        let Some(directive) = &self.current else {
            return false;
        };
        match directive.kind() {
            MoveKind::Location => link.send_command(&Command::CancelMoveTo),
            MoveKind::Relative => {
                let zero = Directive::Relative(RelativeDirective {
                    forward: 0.0,
                    right: 0.0,
                    down: 0.0,
                    heading: 0.0,
                    speed: None,
                });
                if !link.send_command(&zero.command()) {
                    return false;
                }
                self.cancel_pending = true;
                true
            }
        }
    }

    /// Position updates are applied even without a status; only the status
    /// drives state changes.
    pub fn on_move_to_changed(
        &mut self,
        latitude: f64,
        longitude: f64,
        altitude: f64,
        orientation: Option<OrientationMode>,
        heading: f32,
        status: Option<MoveStatus>,
    ) {
        let known = [latitude, longitude, altitude].iter().all(|v| *v != UNKNOWN_COORDINATE);
        let reported = known.then(|| {
            let speed = match &self.current {
                Some(Directive::Location(d)) => d.speed,
                _ => None,
            };
            let orientation = orientation.map(|m| Orientation::from_wire(m, heading)).unwrap_or(Orientation::None);
            LocationDirective { latitude, longitude, altitude, orientation, speed }
        });
        let names_superseded = match (&reported, &self.superseded) {
            (Some(r), Some(Directive::Location(old))) => same_target(r, old),
            _ => false,
        };

        match status {
            None => {
                let tracking = matches!(self.current, Some(Directive::Location(_)));
                if let (Some(r), true, false) = (reported, tracking, names_superseded) {
                    self.current = Some(Directive::Location(r));
                }
            }
            Some(MoveStatus::Running) => {
                if names_superseded {
                    debug!("progress for superseded move ignored");
                    return;
                }
                if matches!(self.current, Some(Directive::Relative(_))) {
                    debug!("location progress during relative move ignored");
                } else if let Some(r) = reported {
                    if self.current.is_none() {
                        info!("adopting move started elsewhere");
                    }
                    self.current = Some(Directive::Location(r));
                    self.activation.set_engaged(true);
                } else if self.current.is_some() {
                    self.activation.set_engaged(true);
                } else {
                    debug!("progress for unknown move ignored");
                }
            }
            Some(status) => {
                let success = status == MoveStatus::Done;
                if names_superseded {
                    self.finish_superseded(success, None);
                } else if matches!(self.current, Some(Directive::Location(_))) {
                    self.finish_current(success, None);
                } else if matches!(self.superseded, Some(Directive::Location(_))) {
                    self.finish_superseded(success, None);
                } else {
                    debug!("location move end with no location move in flight");
                }
            }
        }
    }

    /// Only progress is taken from here; the outcome comes with the end event.
    pub fn on_move_by_changed(&mut self, dx: f32, dy: f32, dz: f32, dpsi: f32, status: MoveStatus) {
        if status != MoveStatus::Running {
            return;
        }
        let speed = match &self.current {
            Some(Directive::Relative(d)) => d.speed,
            _ => None,
        };
        let reported = RelativeDirective { forward: dx, right: dy, down: dz, heading: dpsi.to_degrees(), speed };
        if matches!(&self.superseded, Some(Directive::Relative(old)) if same_displacement(&reported, old)) {
            debug!("progress for superseded move ignored");
            return;
        }
        match self.current.as_ref().map(Directive::kind) {
            // relative progress echoes the request, nothing to refresh
            Some(MoveKind::Relative) => {
                self.activation.set_engaged(true);
            }
            Some(MoveKind::Location) => debug!("relative progress during location move ignored"),
            None if self.cancel_pending => debug!("progress of the cancel move ignored"),
            None => {
                info!("adopting move started elsewhere");
                self.current = Some(Directive::Relative(reported));
                self.activation.set_engaged(true);
            }
        }
    }

    /// An interrupted end belongs to the superseded move when there is one;
    /// any other end belongs to the current move.
    pub fn on_move_by_end(&mut self, dx: f32, dy: f32, dz: f32, dpsi: f32, error: MoveByError) {
        let actual = Some([dx, dy, dz, dpsi.to_degrees()]);
        let success = error == MoveByError::Ok;
        if error == MoveByError::Interrupted && matches!(self.superseded, Some(Directive::Relative(_))) {
            self.finish_superseded(false, actual);
        } else if matches!(self.current, Some(Directive::Relative(_))) {
            self.finish_current(success, actual);
        } else if self.cancel_pending {
            debug!("cancel move ended");
            self.cancel_pending = false;
            self.activation.set_engaged(false);
        } else {
            debug!("relative move end with no relative move in flight");
        }
    }

    fn finish_current(&mut self, success: bool, actual: Option<[f32; 4]>) {
        if let Some(done) = self.current.take() {
            info!("guided move finished, success={}", success);
            self.latest_finished = Some(finished(done, success, actual));
        }
        // the device has moved past anything older
        self.superseded = None;
        self.activation.set_engaged(self.cancel_pending);
    }

    fn finish_superseded(&mut self, success: bool, actual: Option<[f32; 4]>) {
        if let Some(done) = self.superseded.take() {
            info!("superseded guided move finished, success={}", success);
            self.latest_finished = Some(finished(done, success, actual));
        }
    }

    /// Everything in flight ends unsuccessfully; used when the drone can no
    /// longer be guided.
    fn abort_all(&mut self) {
        if let Some(directive) = self.current.take() {
            info!("guided move aborted");
            self.latest_finished = Some(finished(directive, false, None));
        }
        self.superseded = None;
        self.cancel_pending = false;
        self.activation.set_engaged(false);
    }
}

fn close(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

fn same_target(a: &LocationDirective, b: &LocationDirective) -> bool {
    close(a.latitude, b.latitude, 1e-7) && close(a.longitude, b.longitude, 1e-7) && close(a.altitude, b.altitude, 1e-2)
}

fn same_displacement(a: &RelativeDirective, b: &RelativeDirective) -> bool {
    [(a.forward, b.forward), (a.right, b.right), (a.down, b.down), (a.heading, b.heading)]
        .iter()
        .all(|(x, y)| close(f64::from(*x), f64::from(*y), 1e-2))
}

fn finished(directive: Directive, success: bool, actual: Option<[f32; 4]>) -> FinishedFlightInfo {
    match directive {
        Directive::Location(directive) => FinishedFlightInfo::Location { directive, success },
        Directive::Relative(directive) => {
            let [actual_forward, actual_right, actual_down, actual_heading] = actual.unwrap_or_default();
            FinishedFlightInfo::Relative { directive, success, actual_forward, actual_right, actual_down, actual_heading }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::RecordingTransport;
    use skyctl_proto::JsonCodec;
    use std::sync::Arc;
    use ActivationState::*;

    fn flying() -> (GuidedTracker, Link, RecordingTransport) {
        let rec = RecordingTransport::default();
        let mut link = Link::new(Arc::new(JsonCodec), Arc::new(rec.clone()));
        link.set_connected(true);
        let mut g = GuidedTracker::default();
        g.on_connected();
        assert_eq!(g.state(), Unavailable);
        g.on_flying_state(FlyingState::Flying);
        assert_eq!(g.state(), Idle);
        (g, link, rec)
    }

    fn loc(lat: f64, lon: f64, alt: f64, orientation: Orientation) -> Directive {
        Directive::Location(LocationDirective { latitude: lat, longitude: lon, altitude: alt, orientation, speed: None })
    }

    fn rel(forward: f32, right: f32, down: f32, heading: f32) -> Directive {
        Directive::Relative(RelativeDirective { forward, right, down, heading, speed: None })
    }

    #[test]
    fn test_start_declined_when_not_flying() {
        let rec = RecordingTransport::default();
        let mut link = Link::new(Arc::new(JsonCodec), Arc::new(rec.clone()));
        link.set_connected(true);
        let mut g = GuidedTracker::default();
        g.on_connected();
        assert!(!g.start(loc(48.0, 2.0, 10.0, Orientation::ToTarget), &link));
        assert!(rec.take_commands().is_empty());
        assert!(g.current_directive().is_none());
    }

    #[test]
    fn test_location_move_lifecycle() {
        let (mut g, link, rec) = flying();
        let d = loc(48.0, 2.0, 10.0, Orientation::HeadingStart(95.0));
        assert!(g.start(d.clone(), &link));
        assert_eq!(
            rec.take_commands(),
            vec![Command::MoveTo {
                latitude: 48.0,
                longitude: 2.0,
                altitude: 10.0,
                orientation: OrientationMode::HeadingStart,
                heading: 95.0,
                speed: None
            }]
        );
        // visible at once, not active yet
        assert_eq!(g.current_directive(), Some(&d));
        assert_eq!(g.state(), Idle);

        g.on_move_to_changed(48.0, 2.0, 10.0, Some(OrientationMode::HeadingStart), 95.0, Some(MoveStatus::Running));
        assert_eq!(g.state(), Active);

        g.on_move_to_changed(48.0, 2.0, 10.0, Some(OrientationMode::HeadingStart), 95.0, Some(MoveStatus::Done));
        assert_eq!(g.state(), Idle);
        assert!(g.current_directive().is_none());
        let info = g.latest_finished().unwrap();
        assert!(info.success());
        assert_eq!(info, &FinishedFlightInfo::Location {
            directive: LocationDirective {
                latitude: 48.0,
                longitude: 2.0,
                altitude: 10.0,
                orientation: Orientation::HeadingStart(95.0),
                speed: None
            },
            success: true
        });
    }

    #[test]
    fn test_location_stop_sends_cancel() {
        let (mut g, link, rec) = flying();
        g.start(loc(48.0, 2.0, 10.0, Orientation::ToTarget), &link);
        g.on_move_to_changed(48.0, 2.0, 10.0, Some(OrientationMode::ToTarget), 0.0, Some(MoveStatus::Running));
        rec.take_commands();

        assert!(g.stop(&link));
        assert_eq!(rec.take_commands(), vec![Command::CancelMoveTo]);
        assert_eq!(g.state(), Active, "nothing changes until the device answers");

        g.on_move_to_changed(48.0, 2.0, 10.0, Some(OrientationMode::ToTarget), 0.0, Some(MoveStatus::Canceled));
        assert_eq!(g.state(), Idle);
        assert!(!g.latest_finished().unwrap().success());
    }

    #[test]
    fn test_superseded_relative_move_keeps_its_own_outcome() {
        let (mut g, link, rec) = flying();
        let a = rel(10.0, 2.5, -5.0, 45.0);
        let b = rel(50.0, -1.0, 0.5, 0.0);
        g.start(a.clone(), &link);
        g.on_move_by_changed(10.0, 2.5, -5.0, 45f32.to_radians(), MoveStatus::Running);
        g.start(b.clone(), &link);
        assert_eq!(g.current_directive(), Some(&b));
        assert_eq!(rec.take_commands().len(), 2);

        g.on_move_by_end(5.0, 1.25, -2.5, 45f32.to_radians(), MoveByError::Interrupted);
        assert_eq!(g.current_directive(), Some(&b));
        assert_eq!(g.state(), Active);
        match g.latest_finished().unwrap() {
            FinishedFlightInfo::Relative { directive, success, actual_forward, .. } => {
                assert_eq!(Directive::Relative(directive.clone()), a);
                assert!(!success);
                assert_eq!(*actual_forward, 5.0);
            }
            other => panic!("unexpected {other:?}"),
        }

        // cancel b with a zero move
        assert!(g.stop(&link));
        assert_eq!(rec.take_commands(), vec![Command::MoveBy { dx: 0.0, dy: 0.0, dz: 0.0, dpsi: 0.0, speed: None }]);

        g.on_move_by_end(43.2, -0.89, 0.49, -0.01, MoveByError::Interrupted);
        assert!(g.current_directive().is_none());
        assert_eq!(g.state(), Active, "zero move still in flight");
        match g.latest_finished().unwrap() {
            FinishedFlightInfo::Relative { directive, .. } => assert_eq!(Directive::Relative(directive.clone()), b),
            other => panic!("unexpected {other:?}"),
        }

        // the zero move's own end is not an outcome
        let before = g.latest_finished().cloned();
        g.on_move_by_end(0.01, -0.01, 0.02, 0.0, MoveByError::Ok);
        assert_eq!(g.state(), Idle);
        assert_eq!(g.latest_finished().cloned(), before);
    }

    #[test]
    fn test_running_for_superseded_location_move_ignored() {
        let (mut g, link, _rec) = flying();
        g.start(loc(48.0, 2.0, 10.0, Orientation::None), &link);
        let b = loc(49.0, 3.0, 20.0, Orientation::None);
        g.start(b.clone(), &link);
        g.on_move_to_changed(48.0, 2.0, 10.0, Some(OrientationMode::None), 0.0, Some(MoveStatus::Running));
        assert_eq!(g.current_directive(), Some(&b));
        assert_eq!(g.state(), Idle);

        g.on_move_to_changed(48.0, 2.0, 10.0, Some(OrientationMode::None), 0.0, Some(MoveStatus::Canceled));
        g.on_move_to_changed(49.0, 3.0, 20.0, Some(OrientationMode::None), 0.0, Some(MoveStatus::Running));
        assert_eq!(g.state(), Active);
        assert_eq!(g.current_directive(), Some(&b));
    }

    #[test]
    fn test_unreported_superseded_move_does_not_block_current() {
        let (mut g, link, _rec) = flying();
        let a = loc(48.85, 2.0, 10.0, Orientation::None);
        let b = loc(48.86, 2.0, 10.0, Orientation::None);
        g.start(a, &link);
        g.start(b.clone(), &link);

        g.on_move_to_changed(48.86, 2.0, 10.0, Some(OrientationMode::None), 0.0, Some(MoveStatus::Running));
        assert_eq!(g.state(), Active);
        g.on_move_to_changed(48.86, 2.0, 10.0, Some(OrientationMode::None), 0.0, Some(MoveStatus::Done));
        assert_eq!(g.state(), Idle);
        assert!(g.current_directive().is_none());
        assert_eq!(g.latest_finished(), Some(&finished(b, true, None)));

        // a late end for the dropped move changes nothing
        g.on_move_to_changed(48.85, 2.0, 10.0, Some(OrientationMode::None), 0.0, Some(MoveStatus::Canceled));
        assert!(g.latest_finished().unwrap().success());
    }

    #[test]
    fn test_position_update_without_status() {
        let (mut g, link, _rec) = flying();
        g.start(loc(48.0, 2.0, 10.0, Orientation::ToTarget), &link);
        g.on_move_to_changed(48.0, 2.0, 15.0, Some(OrientationMode::ToTarget), 0.0, None);
        assert_eq!(g.current_directive(), Some(&loc(48.0, 2.0, 15.0, Orientation::ToTarget)));
        assert_eq!(g.state(), Idle);
    }

    #[test]
    fn test_live_update_skips_unknown_coordinates() {
        let (mut g, link, _rec) = flying();
        let d = loc(48.0, 2.0, 10.0, Orientation::ToTarget);
        g.start(d.clone(), &link);
        g.on_move_to_changed(UNKNOWN_COORDINATE, 2.0, 10.0, None, 0.0, Some(MoveStatus::Running));
        assert_eq!(g.current_directive(), Some(&d));
        assert_eq!(g.state(), Active);

        g.on_move_to_changed(48.0, 2.0, 12.0, Some(OrientationMode::ToTarget), 0.0, Some(MoveStatus::Running));
        assert_eq!(g.current_directive(), Some(&loc(48.0, 2.0, 12.0, Orientation::ToTarget)));
    }

    #[test]
    fn test_landing_aborts_current_move() {
        let (mut g, link, _rec) = flying();
        g.start(rel(1.0, 0.0, 0.0, 0.0), &link);
        g.on_move_by_changed(1.0, 0.0, 0.0, 0.0, MoveStatus::Running);
        g.on_flying_state(FlyingState::Landing);
        assert_eq!(g.state(), Unavailable);
        assert!(g.current_directive().is_none());
        assert!(!g.latest_finished().unwrap().success());
        assert!(g.activation().reasons().contains(&GuidedReason::DroneNotFlying));
    }

    #[test]
    fn test_spontaneous_move_adopted() {
        let (mut g, _link, _rec) = flying();
        g.on_move_by_changed(3.0, 0.0, 0.0, 0.0, MoveStatus::Running);
        assert_eq!(g.state(), Active);
        assert_eq!(g.current_directive(), Some(&rel(3.0, 0.0, 0.0, 0.0)));
        g.on_move_by_end(3.0, 0.0, 0.0, 0.0, MoveByError::Ok);
        assert_eq!(g.state(), Idle);
        assert!(g.latest_finished().unwrap().success());
    }

    #[test]
    fn test_relative_heading_sent_in_radians() {
        let (mut g, link, rec) = flying();
        g.start(rel(10.0, 2.5, -5.0, 45.0), &link);
        match &rec.take_commands()[0] {
            Command::MoveBy { dpsi, .. } => assert!((dpsi - std::f32::consts::FRAC_PI_4).abs() < 1e-6),
            other => panic!("unexpected {other:?}"),
        }
    }
}
