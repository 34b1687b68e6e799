#![doc = include_str!("../../../README.md")]

mod checker;
mod collapse;
mod config;
mod engine;
mod error;
mod event;
mod exception;
mod frame;
mod highlight;
mod record;
mod repr;
mod router;
mod source_line;
mod traceback;
mod value;

pub use crate::{
    checker::{
        CheckEntry, CheckResult, Checker, FINAL_TEXT_STEP, InternalError, MessageRenderer, PlainHtmlRenderer,
        Prediction, Step, StepCatalog, StepContext, StepDefinition, StepOutcome, StepResult,
    },
    collapse::{StackItem, collapse_repeated},
    config::{ContextWindow, DEFAULT_PROGRAM_FILENAME, LearntraceConfig, MAX_CONTEXT_LINES},
    engine::{EngineTranscript, ExecutionEngine, ReplayEngine, RunOutcome},
    error::{CheckError, ConfigError, EngineError, ReprError, RouterError, StepError},
    event::{
        CollectOutput, Color, EngineEvent, EventReply, EventSink, InputSource, OutputChunk, OutputSink, PartType,
        RawPart, RoutedOutput, ScriptedInput,
    },
    exception::{CodeId, CodeInfo, CodeLoc, CodeRange, FAILED_STR_MESSAGE, RaisedException, RawFrame, StatementSpan},
    frame::FrameFormatter,
    highlight::{HighlightLine, Highlighter},
    record::{
        ExceptionRecord, FrameEntry, LineEntry, RepeatedFrameGroup, RepeatedFrameRow, SourceLine, StackEntry,
        VariableEntry,
    },
    repr::{ReprLimits, SafeRepr},
    router::OutputEventRouter,
    source_line::{ProgramSource, SnippetLine, SourceLineRenderer},
    traceback::{CAUSE_MESSAGE, CONTEXT_MESSAGE, TracebackSerializer},
    value::{ObjectRepr, Value},
};
