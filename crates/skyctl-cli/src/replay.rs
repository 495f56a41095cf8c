use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use skyctl_fc::{DroneSession, PresetStore, RecordingTransport, SessionConfig, SessionInput, UserAction};
use skyctl_proto::{Command, Event, JsonCodec};
use tokio::sync::mpsc;
use tracing::info;

use crate::upload::SimUploader;

#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Connect,
    Disconnect,
    Event { event: Event },
    User { action: UserAction },
    /// Lets time pass; uploads and piloting commands complete meanwhile.
    Wait { ms: u64 },
    Forget,
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read scenario {}", path.display()))?;
    let scenario: Scenario = toml::from_str(&s).context("parse scenario toml")?;
    anyhow::ensure!(!scenario.steps.is_empty(), "scenario has no steps");
    Ok(scenario)
}

pub struct UploadSim {
    pub delay: Duration,
    pub fail: bool,
}

/// What a replay produced, one line per observable effect.
#[derive(Debug, Default)]
pub struct Report {
    pub lines: Vec<String>,
}

impl Report {
    fn push(&mut self, line: String) {
        println!("{}", line);
        self.lines.push(line);
    }
}

pub async fn replay(
    scenario: Scenario,
    config: &SessionConfig,
    store: Box<dyn PresetStore>,
    upload: UploadSim,
) -> Result<Report> {
    let rec = RecordingTransport::default();
    let (tx, mut rx) = mpsc::channel(16);
    let uploader = SimUploader::new(tx, upload.delay, upload.fail);
    let mut session =
        DroneSession::new(config, Arc::new(JsonCodec), Arc::new(rec.clone()), store, Box::new(uploader));
    let mut report = Report::default();

    info!("replay: {} steps", scenario.steps.len());
    for (i, step) in scenario.steps.into_iter().enumerate() {
        report.push(format!("[{}] {}", i, describe(&step)));
        match step {
            Step::Connect => session.apply(SessionInput::Connected),
            Step::Disconnect => session.apply(SessionInput::Disconnected),
            Step::Event { event } => session.apply(SessionInput::Event(event)),
            Step::User { action } => session.apply(SessionInput::User(action)),
            Step::Forget => session.forget(),
            Step::Wait { ms } => {
                let deadline = tokio::time::sleep(Duration::from_millis(ms));
                tokio::pin!(deadline);
                loop {
                    tokio::select! {
                        _ = &mut deadline => break,
                        Some(input) = rx.recv() => {
                            report.push(format!("    <- {}", describe_input(&input)));
                            session.apply(input);
                        }
                    }
                }
            }
        }
        drain_commands(&rec, &mut report)?;
    }

    if session.is_connected() {
        session.apply(SessionInput::Disconnected);
    }
    report.push(snapshot(&session)?);
    Ok(report)
}

fn describe(step: &Step) -> String {
    match step {
        Step::Connect => "connect".into(),
        Step::Disconnect => "disconnect".into(),
        Step::Event { event } => format!("event {}", event.name()),
        Step::User { action } => format!("user {:?}", action),
        Step::Wait { ms } => format!("wait {}ms", ms),
        Step::Forget => "forget".into(),
    }
}

fn describe_input(input: &SessionInput) -> String {
    match input {
        SessionInput::UploadComplete(r) => {
            format!("upload {:?} {:?} http={:?} id={:?}", r.token, r.status, r.http_code, r.plan_id)
        }
        other => format!("{:?}", other),
    }
}

fn drain_commands(rec: &RecordingTransport, report: &mut Report) -> Result<()> {
    let mut pcmds = 0usize;
    for cmd in rec.take_commands() {
        if matches!(cmd, Command::Pcmd { .. }) {
            pcmds += 1;
            continue;
        }
        report.push(format!("    -> {}", serde_json::to_string(&cmd).context("encode command")?));
    }
    if pcmds > 0 {
        report.push(format!("    -> pcmd x{}", pcmds));
    }
    Ok(())
}

fn snapshot(session: &DroneSession) -> Result<String> {
    let views = serde_json::json!({
        "manual": session.manual_capability().is_published().then(|| session.manual_capability().state()),
        "guided": session.guided_capability().is_published().then(|| session.guided_capability().state()),
        "flight_plan": session.flight_plan_capability().is_published().then(|| session.flight_plan_capability().state()),
        "look_at": session.look_at_capability().is_published().then(|| session.look_at_capability().state()),
    });
    serde_json::to_string_pretty(&views).context("encode snapshot")
}
