use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use skyctl_proto::{Codec, Command, JsonCodec};
use tracing::{debug, warn};

/// Byte-level sink towards the device.
pub trait Transport: Send + Sync {
    /// Returns false when the transport is not ready to take the frame.
    fn send(&self, frame: Bytes, ack_required: bool) -> bool;
}

/// Encodes and sends commands for one device session.
#[derive(Clone)]
pub struct Link {
    codec: Arc<dyn Codec>,
    transport: Arc<dyn Transport>,
    connected: bool,
}

impl Link {
    pub fn new(codec: Arc<dyn Codec>, transport: Arc<dyn Transport>) -> Self {
        Self { codec, transport, connected: false }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Sends `command` if the session is up. Callers fall back to their
    /// offline rules on `false`.
    pub fn send_command(&self, command: &Command) -> bool {
        if !self.connected {
            debug!("{} not sent: offline", command.name());
            return false;
        }
        let frame = self.codec.encode(command);
        let sent = self.transport.send(frame, command.ack_required());
        if !sent {
            warn!("{} not sent: transport not ready", command.name());
        } else if command.ack_required() {
            debug!("sent {}", command.name());
        }
        sent
    }
}

/// Transport that keeps every frame it is handed. Used by replay and tests.
#[derive(Clone)]
pub struct RecordingTransport {
    frames: Arc<Mutex<Vec<Bytes>>>,
    ready: Arc<AtomicBool>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self { frames: Arc::default(), ready: Arc::new(AtomicBool::new(true)) }
    }
}

impl RecordingTransport {
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Drains the recorded frames, decoded back into commands.
    pub fn take_commands(&self) -> Vec<Command> {
        let frames = std::mem::take(&mut *self.lock());
        frames
            .iter()
            .filter_map(|f| match JsonCodec.decode_command(f) {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!("recorded frame undecodable: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Like [`take_commands`](Self::take_commands) without the periodic piloting frames.
    pub fn take_acked(&self) -> Vec<Command> {
        self.take_commands().into_iter().filter(Command::ack_required).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Bytes>> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Transport for RecordingTransport {
    fn send(&self, frame: Bytes, _ack_required: bool) -> bool {
        if !self.ready.load(Ordering::SeqCst) {
            return false;
        }
        self.lock().push(frame);
        true
    }
}
