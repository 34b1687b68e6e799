//! The check entry point: run a submission, then ask the lesson step whether
//! it passed.
//!
//! [`Checker::check_entry`] never fails. Learner mistakes end up in the
//! routed output and in `passed = false`; anything going wrong in this crate
//! or its collaborators is reported in the result's `error` field.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};

use html_escape::encode_text;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    engine::ExecutionEngine,
    error::{CheckError, StepError},
    event::{InputSource, OutputSink},
    router::OutputEventRouter,
    source_line::ProgramSource,
    traceback::TracebackSerializer,
};

/// Steps with this name only show text and are never checked.
pub const FINAL_TEXT_STEP: &str = "final_text";

/// One submission to check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckEntry {
    /// The learner's program.
    pub input: String,
    /// Where the program was submitted from, e.g. `"editor"` or `"shell"`.
    pub source: String,
    pub page_slug: String,
    pub step_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub choices: Option<Vec<String>>,
    pub answer: Option<String>,
}

/// An internal failure, as reported to the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalError {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub passed: bool,
    /// Feedback, already rendered to HTML.
    pub messages: Vec<String>,
    pub error: Option<InternalError>,
    pub prediction: Prediction,
}

impl CheckResult {
    /// The result of a check that did not pass and has nothing to say.
    #[must_use]
    pub fn not_passed() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn internal_error(err: &CheckError) -> Self {
        Self {
            error: Some(InternalError {
                kind: err.kind().to_owned(),
                message: err.to_string(),
            }),
            ..Self::default()
        }
    }
}

/// What a step sees of the run it judges.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// The learner's program.
    pub input: &'a str,
    /// Everything the program wrote, echoed input excluded, followed by the
    /// shell prompt when one is configured.
    pub output: &'a str,
    pub source: &'a str,
}

/// A step's verdict, in either of the shapes steps may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Passed(bool),
    Detailed {
        passed: Option<bool>,
        messages: Vec<String>,
        message: Option<String>,
    },
}

impl From<bool> for StepOutcome {
    fn from(passed: bool) -> Self {
        Self::Passed(passed)
    }
}

/// A [`StepOutcome`] in its one normal form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepResult {
    pub passed: bool,
    pub messages: Vec<String>,
}

impl From<StepOutcome> for StepResult {
    fn from(outcome: StepOutcome) -> Self {
        match outcome {
            StepOutcome::Passed(passed) => Self {
                passed,
                messages: Vec::new(),
            },
            StepOutcome::Detailed {
                passed,
                mut messages,
                message,
            } => {
                messages.extend(message);
                Self {
                    passed: passed.unwrap_or(false),
                    messages,
                }
            }
        }
    }
}

/// A step instance bound to one run.
pub trait Step {
    fn check_with_messages(&mut self) -> Result<StepOutcome, StepError>;
}

/// A lesson step: builds [`Step`]s and knows the expected output.
pub trait StepDefinition {
    /// Binds the step to a finished run. A [`StepError::Syntax`] here means
    /// the learner's code could not be analysed and the step did not pass.
    fn build(&self, context: StepContext<'_>) -> Result<Box<dyn Step + '_>, StepError>;

    /// Output options offered to the learner for predicting what the program
    /// prints.
    fn predicted_output_choices(&self) -> Option<Vec<String>> {
        None
    }

    fn correct_output(&self) -> Option<String> {
        None
    }
}

/// Looks up lesson steps.
pub trait StepCatalog {
    fn step(&self, page_slug: &str, step_name: &str) -> Option<&dyn StepDefinition>;
}

/// Turns a feedback message (markdown) into HTML.
pub trait MessageRenderer {
    fn render(&self, message: &str) -> String;
}

/// Renders each message as one escaped paragraph, without interpreting any
/// markdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHtmlRenderer;

impl MessageRenderer for PlainHtmlRenderer {
    fn render(&self, message: &str) -> String {
        format!("<p>{}</p>", encode_text(message))
    }
}

#[derive(Debug)]
pub struct Checker<C, M = PlainHtmlRenderer> {
    serializer: TracebackSerializer,
    catalog: C,
    renderer: M,
}

impl<C: StepCatalog> Checker<C> {
    #[must_use]
    pub fn new(serializer: TracebackSerializer, catalog: C) -> Self {
        Self::with_renderer(serializer, catalog, PlainHtmlRenderer)
    }
}

impl<C: StepCatalog, M: MessageRenderer> Checker<C, M> {
    #[must_use]
    pub fn with_renderer(serializer: TracebackSerializer, catalog: C, renderer: M) -> Self {
        Self {
            serializer,
            catalog,
            renderer,
        }
    }

    #[must_use]
    pub fn serializer(&self) -> &TracebackSerializer {
        &self.serializer
    }

    /// Runs `entry` on `engine` and checks it against its lesson step.
    ///
    /// Blank programs are not run at all. Output is routed to `output` as it
    /// is produced, and input requests block on `input`.
    pub fn check_entry<E, I, O>(&self, entry: &CheckEntry, engine: &mut E, input: I, output: O) -> CheckResult
    where
        E: ExecutionEngine,
        I: InputSource,
        O: OutputSink,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_check(entry, engine, input, output)));
        let err = match outcome {
            Ok(Ok(result)) => return result,
            Ok(Err(err)) => err,
            Err(payload) => CheckError::Panic(panic_message(payload.as_ref())),
        };
        error!(
            page = %entry.page_slug,
            step = %entry.step_name,
            kind = err.kind(),
            "internal error during check: {err}"
        );
        CheckResult::internal_error(&err)
    }

    fn try_check<E, I, O>(
        &self,
        entry: &CheckEntry,
        engine: &mut E,
        input: I,
        output: O,
    ) -> Result<CheckResult, CheckError>
    where
        E: ExecutionEngine,
        I: InputSource,
        O: OutputSink,
    {
        if entry.input.trim().is_empty() {
            return Ok(CheckResult::not_passed());
        }

        let program = ProgramSource::new(&entry.input);
        let mut router = OutputEventRouter::new(&self.serializer, &program, &entry.source, input, output);
        let run = engine.run(&entry.source, &entry.input, &mut router)?;
        if let Some(prompt) = self.serializer.config().prompt() {
            router.emit_prompt(prompt);
        }
        if run.interrupted {
            info!(page = %entry.page_slug, step = %entry.step_name, "run interrupted, not checking");
            return Ok(CheckResult::not_passed());
        }
        let captured = router.into_captured_output();

        let definition = self
            .catalog
            .step(&entry.page_slug, &entry.step_name)
            .ok_or_else(|| CheckError::UnknownStep {
                page: entry.page_slug.clone(),
                step: entry.step_name.clone(),
            })?;

        let outcome = if entry.step_name == FINAL_TEXT_STEP {
            StepOutcome::Passed(false)
        } else {
            let context = StepContext {
                input: &entry.input,
                output: &captured,
                source: &entry.source,
            };
            match definition.build(context).and_then(|mut step| step.check_with_messages()) {
                Ok(outcome) => outcome,
                Err(StepError::Syntax(reason)) => {
                    debug!(%reason, "step hit a syntax error, treating as not passed");
                    StepOutcome::Passed(false)
                }
                Err(err) => return Err(CheckError::Step(err)),
            }
        };

        let step = StepResult::from(outcome);
        let mut result = CheckResult {
            passed: step.passed,
            messages: step.messages.iter().map(|message| self.renderer.render(message)).collect(),
            ..CheckResult::not_passed()
        };
        if result.passed {
            result.prediction = Prediction {
                choices: definition.predicted_output_choices(),
                answer: definition.correct_output(),
            };
        }
        debug!(passed = result.passed, messages = result.messages.len(), "check finished");
        Ok(result)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
