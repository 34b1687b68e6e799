//! Routing of engine events to the output consumer.
//!
//! The router sits between the execution engine and whoever displays the
//! program's output. Output parts are classified and colored, traceback parts
//! get their serialized exception chain attached, and input requests block on
//! the [`InputSource`] until a line is available. Everything runs on the
//! engine's thread, one event at a time.

use tracing::debug;

use crate::{
    error::RouterError,
    event::{
        Color, EngineEvent, EventReply, EventSink, InputSource, OutputChunk, OutputSink, PartType, RawPart,
        RoutedOutput,
    },
    source_line::ProgramSource,
    traceback::TracebackSerializer,
};

pub struct OutputEventRouter<'a, I, O> {
    serializer: &'a TracebackSerializer,
    source: &'a ProgramSource,
    code_source: &'a str,
    input: I,
    output: O,
    captured: String,
}

impl<'a, I, O> OutputEventRouter<'a, I, O>
where
    I: InputSource,
    O: OutputSink,
{
    /// Creates a router for one run.
    ///
    /// `source` is the learner's program, used to render traceback lines;
    /// `code_source` is attached to every traceback chunk.
    pub fn new(
        serializer: &'a TracebackSerializer,
        source: &'a ProgramSource,
        code_source: &'a str,
        input: I,
        output: O,
    ) -> Self {
        Self {
            serializer,
            source,
            code_source,
            input,
            output,
            captured: String::new(),
        }
    }

    /// Text of every output part routed so far, excluding echoed input.
    #[must_use]
    pub fn captured_output(&self) -> &str {
        &self.captured
    }

    /// Ends the run, returning the captured output.
    #[must_use]
    pub fn into_captured_output(self) -> String {
        self.captured
    }

    /// Writes a shell prompt after the program finished, as stdout of the
    /// run: it is captured like any other output.
    pub fn emit_prompt(&mut self, prompt: &str) -> O::Reply {
        self.captured.push_str(prompt);
        self.output.emit(RoutedOutput {
            parts: vec![OutputChunk::new(prompt, Color::White)],
        })
    }

    fn route_input(&mut self, prompt: &str) -> Option<String> {
        debug!(prompt, "waiting for input");
        let mut line = self.input.read_line(prompt)?;
        if !line.ends_with('\n') {
            line.push('\n');
        }
        Some(line)
    }

    fn route_output(&mut self, parts: Vec<RawPart>) -> Result<RoutedOutput, RouterError> {
        let mut chunks = Vec::with_capacity(parts.len());
        for part in parts {
            let kind = part.kind()?;
            if kind == PartType::Input {
                continue;
            }
            let mut chunk = OutputChunk::new(part.text, kind.color());
            if kind == PartType::Traceback {
                let exception = part.exception.ok_or(RouterError::MissingException)?;
                chunk.is_traceback = true;
                chunk.tracebacks = Some(self.serializer.format_exception(&exception, self.source));
                chunk.code_source = Some(self.code_source.to_owned());
            }
            self.captured.push_str(&chunk.text);
            chunks.push(chunk);
        }
        Ok(RoutedOutput { parts: chunks })
    }
}

impl<I, O> EventSink for OutputEventRouter<'_, I, O>
where
    I: InputSource,
    O: OutputSink,
{
    type Reply = O::Reply;

    fn handle(&mut self, event: EngineEvent) -> Result<EventReply<O::Reply>, RouterError> {
        match event {
            EngineEvent::Input { prompt } => Ok(EventReply::Input(self.route_input(&prompt))),
            EngineEvent::Output { parts } => {
                let routed = self.route_output(parts)?;
                debug!(chunks = routed.parts.len(), "routed output event");
                Ok(EventReply::Output(self.output.emit(routed)))
            }
        }
    }
}
