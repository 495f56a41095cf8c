use std::collections::BTreeSet;

use serde::Serialize;
use skyctl_proto::event::{FlyingState, FollowBehavior};
use skyctl_proto::{Command, FollowMode};
use tracing::debug;

use crate::activation::{Activation, ActivationState};
use crate::link::Link;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingIssue {
    DroneNotCalibrated,
    DroneGpsInfoInaccurate,
    TargetGpsInfoInaccurate,
    TargetBarometerInfoInaccurate,
    DroneTooCloseToTarget,
    DroneTooCloseToGround,
    TargetDetectionInfoMissing,
    TargetHorizontalSpeedKo,
    DroneTooFarFromTarget,
    DroneNotFlying,
}

/// Input bits of the mode-info bitfields, in wire order. A set bit means the
/// input is satisfied.
const INPUTS: [TrackingIssue; 9] = [
    TrackingIssue::DroneNotCalibrated,
    TrackingIssue::DroneGpsInfoInaccurate,
    TrackingIssue::TargetGpsInfoInaccurate,
    TrackingIssue::TargetBarometerInfoInaccurate,
    TrackingIssue::DroneTooCloseToTarget,
    TrackingIssue::DroneTooCloseToGround,
    TrackingIssue::TargetDetectionInfoMissing,
    TrackingIssue::TargetHorizontalSpeedKo,
    TrackingIssue::DroneTooFarFromTarget,
];

fn unmet(bitfield: u32) -> BTreeSet<TrackingIssue> {
    INPUTS
        .iter()
        .enumerate()
        .filter(|(bit, _)| bitfield & (1 << bit) == 0)
        .map(|(_, issue)| *issue)
        .collect()
}

/// Snapshot handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookAtView {
    pub state: ActivationState,
    pub reasons: BTreeSet<TrackingIssue>,
    pub quality_issues: BTreeSet<TrackingIssue>,
}

impl LookAtView {
    pub fn update_state(&mut self, state: ActivationState) -> &mut Self {
        self.state = state;
        self
    }

    pub fn update_reasons(&mut self, reasons: &BTreeSet<TrackingIssue>) -> &mut Self {
        self.reasons.clone_from(reasons);
        self
    }

    pub fn update_quality_issues(&mut self, issues: BTreeSet<TrackingIssue>) -> &mut Self {
        self.quality_issues = issues;
        self
    }
}

/// Look-at tracking: the drone keeps facing the target while the user flies
/// it with the sticks.
pub struct LookAt {
    activation: Activation<TrackingIssue>,
    landed: bool,
    mode: FollowMode,
    behavior: FollowBehavior,
    availability_issues: BTreeSet<TrackingIssue>,
    quality_issues: BTreeSet<TrackingIssue>,
}

impl Default for LookAt {
    fn default() -> Self {
        Self {
            activation: Activation::new("look-at", false),
            landed: true,
            mode: FollowMode::None,
            behavior: FollowBehavior::Idle,
            availability_issues: BTreeSet::new(),
            quality_issues: BTreeSet::new(),
        }
    }
}

impl LookAt {
    pub fn state(&self) -> ActivationState {
        self.activation.state()
    }

    pub fn activation(&self) -> &Activation<TrackingIssue> {
        &self.activation
    }

    pub fn sync_into(&self, view: &mut LookAtView) {
        view.update_state(self.state())
            .update_reasons(self.activation.reasons())
            .update_quality_issues(self.quality_issues());
    }

    pub fn view(&self) -> LookAtView {
        LookAtView {
            state: self.state(),
            reasons: self.activation.reasons().clone(),
            quality_issues: self.quality_issues(),
        }
    }

    pub fn quality_issues(&self) -> BTreeSet<TrackingIssue> {
        if self.activation.reasons().is_empty() {
            self.quality_issues.clone()
        } else {
            BTreeSet::new()
        }
    }

    pub fn on_connected(&mut self) {
        self.activation.set_connected(true);
        self.recompute();
    }

    pub fn on_disconnected(&mut self) {
        *self = Self::default();
    }

    pub fn on_flying_state(&mut self, state: FlyingState) {
        self.landed = state == FlyingState::Landed;
        self.recompute();
    }

    pub fn on_state(&mut self, mode: FollowMode, behavior: Option<FollowBehavior>) {
        self.mode = mode;
        self.behavior = behavior.unwrap_or(FollowBehavior::Idle);
        self.recompute();
    }

    pub fn on_mode_info(&mut self, mode: FollowMode, missing_requirements: u32, improvements: u32) {
        if mode != FollowMode::LookAt {
            debug!("mode info for {:?} ignored", mode);
            return;
        }
        self.availability_issues = unmet(missing_requirements);
        self.quality_issues = unmet(improvements);
        self.recompute();
    }

    pub fn activate(&mut self, link: &Link) -> bool {
        self.activation.can_activate() && link.send_command(&Command::FollowMeStart { mode: FollowMode::LookAt })
    }

    pub fn deactivate(&mut self, link: &Link) -> bool {
        self.activation.can_deactivate() && link.send_command(&Command::FollowMeStop)
    }

    fn recompute(&mut self) {
        let active = self.mode == FollowMode::LookAt && self.behavior != FollowBehavior::Idle && !self.landed;
        let mut issues = BTreeSet::new();
        if !active {
            if self.landed {
                issues.insert(TrackingIssue::DroneNotFlying);
            }
            issues.extend(self.availability_issues.iter().copied());
        }
        self.activation.replace_reasons(issues);
        self.activation.set_engaged(active);
    }
}
