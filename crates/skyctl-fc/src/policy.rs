use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::activation::ActivationState;
use crate::guided::Directive;

/// Piloting interfaces competing for the drone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItfKind {
    Manual,
    Guided,
    FlightPlan,
    LookAt,
}

impl ItfKind {
    /// Interfaces fed by the piloting loop.
    pub fn uses_sticks(self) -> bool {
        matches!(self, ItfKind::Manual | ItfKind::LookAt)
    }
}

/// An activation parked until the current interface lets go.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingActivation {
    Manual,
    Guided(Directive),
    FlightPlan { restart: bool },
    LookAt,
}

impl PendingActivation {
    pub fn kind(&self) -> ItfKind {
        match self {
            PendingActivation::Manual => ItfKind::Manual,
            PendingActivation::Guided(_) => ItfKind::Guided,
            PendingActivation::FlightPlan { .. } => ItfKind::FlightPlan,
            PendingActivation::LookAt => ItfKind::LookAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Proceed,
    /// Deactivate this interface first; the request is replayed afterwards.
    Deferred { deactivate: ItfKind },
}

/// Keeps at most one piloting interface current.
///
/// Manual is current whenever nothing else is. Another interface becomes
/// current only once the device reports it active, and hands back to manual
/// when it stops being active.
#[derive(Debug)]
pub struct ActivationPolicy {
    current: ItfKind,
    pending: Option<PendingActivation>,
}

impl Default for ActivationPolicy {
    fn default() -> Self {
        Self { current: ItfKind::Manual, pending: None }
    }
}

impl ActivationPolicy {
    pub fn current(&self) -> ItfKind {
        self.current
    }

    pub fn pending(&self) -> Option<&PendingActivation> {
        self.pending.as_ref()
    }

    pub fn request(&mut self, request: PendingActivation) -> Admission {
        let kind = request.kind();
        if self.current == ItfKind::Manual || self.current == kind {
            return Admission::Proceed;
        }
        debug!("{:?} activation parked behind {:?}", kind, self.current);
        self.pending = Some(request);
        Admission::Deferred { deactivate: self.current }
    }

    /// Feeds an interface state change. Returns the parked request once the
    /// interface it waited for is no longer active.
    pub fn on_state(&mut self, kind: ItfKind, state: ActivationState) -> Option<PendingActivation> {
        if kind == ItfKind::Manual {
            return None;
        }
        if state == ActivationState::Active {
            if self.current != kind {
                info!("current piloting interface: {:?}", kind);
                self.current = kind;
            }
            return None;
        }
        if self.current != kind {
            return None;
        }
        info!("current piloting interface: Manual");
        self.current = ItfKind::Manual;
        self.pending.take()
    }

    /// Drops the parked request; used when the deactivation it waits on
    /// could not be sent.
    pub fn cancel(&mut self) {
        if let Some(p) = self.pending.take() {
            debug!("{:?} activation dropped", p.kind());
        }
    }

    pub fn reset(&mut self) {
        self.current = ItfKind::Manual;
        self.pending = None;
    }
}
