use std::time::Duration;

use serde::Serialize;
use skyctl_proto::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::link::Link;

/// Latest stick positions, each in [-100, 100].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Sticks {
    pub roll: i8,
    pub pitch: i8,
    pub yaw: i8,
    pub gaz: i8,
}

impl Sticks {
    /// Piloting flag: set when the attitude axes carry a value.
    pub fn flag(&self) -> u8 {
        u8::from(self.roll != 0 || self.pitch != 0)
    }
}

pub fn clamp_axis(value: i32) -> i8 {
    value.clamp(-100, 100) as i8
}

/// Sequence numbers for one run of the piloting loop.
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    next: u32,
}

impl SequenceCounter {
    pub fn starting_at(base: u32) -> Self {
        Self { next: base }
    }

    /// Base derived from wall-clock milliseconds so that a restarted loop
    /// does not replay numbers the device saw moments ago.
    pub fn time_based() -> Self {
        let millis = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        Self::starting_at((millis & 0x00ff_ffff) as u32)
    }

    pub fn next(&mut self) -> u32 {
        let v = self.next;
        self.next = self.next.wrapping_add(1);
        v
    }
}

pub fn encode(sticks: Sticks, seq: u32) -> Command {
    Command::Pcmd {
        flag: sticks.flag(),
        roll: sticks.roll,
        // device pitch axis points the other way
        pitch: sticks.pitch.saturating_neg(),
        yaw: sticks.yaw,
        gaz: sticks.gaz,
        seq,
    }
}

/// Fixed-rate emission of the latest stick snapshot.
///
/// One instance per device session, shared by every manual-style interface.
/// Arming spawns the loop with a fresh sequence counter; disarming aborts it.
pub struct PcmdScheduler {
    period: Duration,
    sticks: watch::Sender<Sticks>,
    armed: bool,
    task: Option<JoinHandle<()>>,
}

impl PcmdScheduler {
    pub fn new(period: Duration) -> Self {
        let (sticks, _rx) = watch::channel(Sticks::default());
        Self { period, sticks, armed: false, task: None }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn sticks(&self) -> Sticks {
        *self.sticks.borrow()
    }

    pub fn set_sticks(&self, sticks: Sticks) {
        self.sticks.send_replace(sticks);
    }

    pub fn update_sticks(&self, f: impl FnOnce(&mut Sticks)) {
        self.sticks.send_modify(f);
    }

    pub fn arm(&mut self, link: Link) {
        if self.armed {
            return;
        }
        self.armed = true;
        let rx = self.sticks.subscribe();
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                info!("piloting loop armed, period {:?}", self.period);
                self.task = Some(rt.spawn(run_loop(link, rx, self.period, SequenceCounter::time_based())));
            }
            Err(_) => warn!("piloting loop armed outside a runtime; no commands will be emitted"),
        }
    }

    pub fn disarm(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.set_sticks(Sticks::default());
        info!("piloting loop disarmed");
    }
}

impl Drop for PcmdScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_loop(link: Link, sticks: watch::Receiver<Sticks>, period: Duration, mut seq: SequenceCounter) {
    let mut tick = tokio::time::interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tick.tick().await;
        let snapshot = *sticks.borrow();
        let cmd = encode(snapshot, seq.next());
        if !link.send_command(&cmd) {
            debug!("pcmd dropped");
        }
    }
}
