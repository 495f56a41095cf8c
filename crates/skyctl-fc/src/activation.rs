use std::collections::BTreeSet;
use std::fmt::Debug;

use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    Unavailable,
    Idle,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ActivationState,
    pub to: ActivationState,
}

/// UNAVAILABLE / IDLE / ACTIVE derivation for one activable interface.
///
/// The state is a pure function of the inputs below, recomputed on every
/// change:
/// - offline: UNAVAILABLE
/// - any unavailability reason: UNAVAILABLE
/// - engaged (the device said so): ACTIVE
/// - device-level availability gate closed: UNAVAILABLE
/// - otherwise IDLE
///
/// Nothing here sends commands; `activate` on an interface is only allowed
/// from IDLE and never moves the state by itself.
#[derive(Debug, Clone)]
pub struct Activation<R> {
    label: &'static str,
    reasons: BTreeSet<R>,
    connected: bool,
    gated: bool,
    available: bool,
    engaged: bool,
    state: ActivationState,
}

impl<R: Ord + Copy + Debug> Activation<R> {
    /// `gated` interfaces stay UNAVAILABLE until the device opens the gate.
    pub fn new(label: &'static str, gated: bool) -> Self {
        Self {
            label,
            reasons: BTreeSet::new(),
            connected: false,
            gated,
            available: !gated,
            engaged: false,
            state: ActivationState::Unavailable,
        }
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    pub fn reasons(&self) -> &BTreeSet<R> {
        &self.reasons
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn can_activate(&self) -> bool {
        self.state == ActivationState::Idle
    }

    pub fn can_deactivate(&self) -> bool {
        self.state == ActivationState::Active
    }

    /// Going offline clears every input, reasons included.
    pub fn set_connected(&mut self, connected: bool) -> Option<Transition> {
        self.connected = connected;
        if !connected {
            self.reasons.clear();
            self.engaged = false;
            self.available = !self.gated;
        }
        self.recompute()
    }

    pub fn set_reason(&mut self, reason: R, present: bool) -> Option<Transition> {
        if present {
            self.reasons.insert(reason);
        } else {
            self.reasons.remove(&reason);
        }
        self.recompute()
    }

    /// Replaces the reason set wholesale.
    pub fn replace_reasons(&mut self, reasons: impl IntoIterator<Item = R>) -> Option<Transition> {
        self.reasons = reasons.into_iter().collect();
        self.recompute()
    }

    pub fn set_available(&mut self, available: bool) -> Option<Transition> {
        self.available = available;
        self.recompute()
    }

    pub fn set_engaged(&mut self, engaged: bool) -> Option<Transition> {
        self.engaged = engaged;
        self.recompute()
    }

    fn recompute(&mut self) -> Option<Transition> {
        let next = if !self.connected || !self.reasons.is_empty() {
            ActivationState::Unavailable
        } else if self.engaged {
            ActivationState::Active
        } else if !self.available {
            ActivationState::Unavailable
        } else {
            ActivationState::Idle
        };
        if next == self.state {
            return None;
        }
        let t = Transition { from: self.state, to: next };
        info!("{}: {:?} -> {:?} reasons={:?}", self.label, t.from, t.to, self.reasons);
        self.state = next;
        Some(t)
    }
}
