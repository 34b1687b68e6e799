//! Serialization of an exception chain into [`ExceptionRecord`]s.
//!
//! The chain is walked root first: an exception's explicit cause, or else its
//! unsuppressed context, is serialized before the exception itself, and the
//! record preceding each link carries the phrase that introduces the next one.

use std::sync::Arc;

use tracing::debug;

use crate::{
    collapse::{StackItem, collapse_repeated},
    config::LearntraceConfig,
    error::ConfigError,
    exception::{RaisedException, RawFrame},
    frame::FrameFormatter,
    highlight::Highlighter,
    record::{ExceptionRecord, StackEntry},
    repr::SafeRepr,
    source_line::{ProgramSource, SourceLineRenderer},
};

/// Introduces an exception raised with `raise ... from`.
pub const CAUSE_MESSAGE: &str = "\nThe above exception was the direct cause of the following exception:\n\n";

/// Introduces an exception raised while another was being handled.
pub const CONTEXT_MESSAGE: &str = "\nDuring handling of the above exception, another exception occurred:\n\n";

#[derive(Debug, Clone)]
pub struct TracebackSerializer {
    config: Arc<LearntraceConfig>,
    highlighter: Arc<Highlighter>,
    repr: SafeRepr,
}

impl TracebackSerializer {
    /// Fails when `config` does not pass [`LearntraceConfig::validate`], which
    /// the `with_*` builders do not check.
    pub fn new(config: Arc<LearntraceConfig>, highlighter: Arc<Highlighter>) -> Result<Self, ConfigError> {
        config.validate()?;
        let repr = SafeRepr::new(config.repr);
        Ok(Self {
            config,
            highlighter,
            repr,
        })
    }

    #[must_use]
    pub fn config(&self) -> &LearntraceConfig {
        &self.config
    }

    /// Serializes `exc` and everything it chains to, root cause first.
    #[must_use]
    pub fn format_exception(&self, exc: &RaisedException, source: &ProgramSource) -> Vec<ExceptionRecord> {
        let records = self.format_chain(exc, source);
        debug!(
            exception = %exc.type_name,
            records = records.len(),
            "serialized exception chain"
        );
        records
    }

    fn format_chain(&self, exc: &RaisedException, source: &ProgramSource) -> Vec<ExceptionRecord> {
        let mut records = if let Some(cause) = &exc.cause {
            self.linked(cause, CAUSE_MESSAGE, source)
        } else if let Some(context) = exc.reported_context() {
            self.linked(context, CONTEXT_MESSAGE, source)
        } else {
            Vec::new()
        };

        records.push(ExceptionRecord {
            frames: self.format_stack(&exc.traceback, source),
            exception_type: exc.type_name.clone(),
            exception_message: exc.message_text().to_owned(),
            tail_text: String::new(),
        });
        records
    }

    fn linked(&self, earlier: &RaisedException, tail: &str, source: &ProgramSource) -> Vec<ExceptionRecord> {
        let mut records = self.format_chain(earlier, source);
        if let Some(last) = records.last_mut() {
            last.tail_text = tail.to_owned();
        }
        records
    }

    /// Formats a traceback (outermost frame first): foreign frames are
    /// dropped, recurring ones collapsed, the rest formatted.
    #[must_use]
    pub fn format_stack(&self, traceback: &[RawFrame], source: &ProgramSource) -> Vec<StackEntry> {
        let formatter = FrameFormatter::new(
            &self.config.program_filename,
            self.config.context,
            self.repr,
            SourceLineRenderer::new(&self.highlighter),
            source,
        );
        let visible: Vec<&RawFrame> = traceback
            .iter()
            .filter(|frame| formatter.is_program_frame(frame))
            .collect();
        collapse_repeated(&visible, self.config.min_repeats)
            .into_iter()
            .filter_map(|item| match item {
                StackItem::Frame(frame) => formatter.format(frame).map(StackEntry::Frame),
                StackItem::Repeated(group) => Some(StackEntry::RepeatedFrames(group)),
            })
            .collect()
    }
}
