//! The execution engine seam.
//!
//! Running learner code happens elsewhere; this crate only needs something
//! that drives events into an [`EventSink`] and says whether the run was cut
//! short. [`ReplayEngine`] plays back a recorded transcript and is what the
//! CLI and the tests use.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::EngineError,
    event::{EngineEvent, EventReply, EventSink},
};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunOutcome {
    /// The run was stopped before the program finished, e.g. because input
    /// ran out or the user cancelled it.
    pub interrupted: bool,
}

/// Runs a learner program, reporting everything it does to `sink`.
///
/// `source` names where the program was submitted from (`"editor"`,
/// `"shell"`, ...), `input` is the program text itself.
///
/// Every `input` event's reply is the next line the program reads; a `None`
/// reply means no line will ever come and the run must end interrupted.
pub trait ExecutionEngine {
    fn run<S: EventSink>(&mut self, source: &str, input: &str, sink: &mut S) -> Result<RunOutcome, EngineError>;
}

/// A recorded run: the events an engine emitted, in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineTranscript {
    pub events: Vec<EngineEvent>,
    /// Whether the recorded run was interrupted after its last event.
    #[serde(default)]
    pub interrupted: bool,
}

impl EngineTranscript {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|err| EngineError::Internal(format!("cannot read transcript {}: {err}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|err| EngineError::Internal(format!("invalid transcript {}: {err}", path.display())))
    }
}

/// Replays an [`EngineTranscript`] instead of executing anything.
///
/// The program passed to [`ExecutionEngine::run`] is not executed, only
/// recorded, so a test can assert what the engine was given.
#[derive(Debug, Clone, Default)]
pub struct ReplayEngine {
    transcript: EngineTranscript,
    runs: Vec<String>,
    inputs: Vec<String>,
}

impl ReplayEngine {
    #[must_use]
    pub fn new(transcript: EngineTranscript) -> Self {
        Self {
            transcript,
            runs: Vec::new(),
            inputs: Vec::new(),
        }
    }

    /// Convenience for a run that just emits `events`.
    #[must_use]
    pub fn from_events(events: impl IntoIterator<Item = EngineEvent>) -> Self {
        Self::new(EngineTranscript {
            events: events.into_iter().collect(),
            interrupted: false,
        })
    }

    /// Program text of every run so far.
    #[must_use]
    pub fn runs(&self) -> &[String] {
        &self.runs
    }

    /// Input lines handed back by the sink, in the order they were read.
    #[must_use]
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }
}

impl ExecutionEngine for ReplayEngine {
    fn run<S: EventSink>(&mut self, source: &str, input: &str, sink: &mut S) -> Result<RunOutcome, EngineError> {
        debug!(source, events = self.transcript.events.len(), "replaying transcript");
        self.runs.push(input.to_owned());
        for event in self.transcript.events.iter().cloned() {
            match sink.handle(event)? {
                EventReply::Input(Some(line)) => {
                    debug!(line = line.trim_end(), "replayed input");
                    self.inputs.push(line);
                }
                EventReply::Input(None) => {
                    info!("input exhausted, stopping replay");
                    return Ok(RunOutcome { interrupted: true });
                }
                EventReply::Output(_) => {}
            }
        }
        Ok(RunOutcome {
            interrupted: self.transcript.interrupted,
        })
    }
}
