//! Events exchanged with the execution engine, and the chunks forwarded to
//! the output consumer.

use std::{collections::VecDeque, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{error::RouterError, exception::RaisedException, record::ExceptionRecord};

/// An event emitted by the execution engine while running a program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Buffered output of the program.
    Output { parts: Vec<RawPart> },
    /// The program is blocked reading a line of input.
    Input {
        #[serde(default)]
        prompt: String,
    },
}

/// One piece of an output event, as the engine produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPart {
    /// Declared kind of the part; the engine must always set it.
    #[serde(rename = "type", default)]
    pub part_type: Option<String>,
    #[serde(default)]
    pub text: String,
    /// The exception behind a `traceback` part.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<RaisedException>,
}

impl RawPart {
    #[must_use]
    pub fn new(part_type: PartType, text: impl Into<String>) -> Self {
        Self {
            part_type: Some(part_type.to_string()),
            text: text.into(),
            exception: None,
        }
    }

    #[must_use]
    pub fn traceback(text: impl Into<String>, exception: RaisedException) -> Self {
        Self {
            exception: Some(exception),
            ..Self::new(PartType::Traceback, text)
        }
    }

    /// Parses the declared type.
    pub fn kind(&self) -> Result<PartType, RouterError> {
        let declared = self.part_type.as_deref().ok_or(RouterError::MissingPartType)?;
        PartType::from_str(declared).map_err(|_| RouterError::UnknownPartType(declared.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum PartType {
    Stdout,
    Stderr,
    Traceback,
    SyntaxError,
    /// Echo of a line the learner typed; never surfaced as output.
    Input,
    /// Prompt text written by the program before reading input.
    InputPrompt,
}

impl PartType {
    #[must_use]
    pub fn color(self) -> Color {
        match self {
            Self::Stderr | Self::Traceback | Self::SyntaxError => Color::Red,
            Self::Stdout | Self::Input | Self::InputPrompt => Color::White,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    White,
}

/// A classified piece of output, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputChunk {
    pub text: String,
    pub color: Color,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_traceback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracebacks: Option<Vec<ExceptionRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_source: Option<String>,
}

impl OutputChunk {
    #[must_use]
    pub fn new(text: impl Into<String>, color: Color) -> Self {
        Self {
            text: text.into(),
            color,
            is_traceback: false,
            tracebacks: None,
            code_source: None,
        }
    }
}

/// The reshaped output event handed to the output sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutedOutput {
    pub parts: Vec<OutputChunk>,
}

/// What an [`EventSink`] answers to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventReply<R> {
    /// Next input line, always newline-terminated. `None` means no more input
    /// will ever arrive and the engine should stop the program.
    Input(Option<String>),
    /// Whatever the output consumer returned.
    Output(R),
}

/// Receives engine events one at a time, on the engine's thread.
pub trait EventSink {
    type Reply;

    fn handle(&mut self, event: EngineEvent) -> Result<EventReply<Self::Reply>, RouterError>;
}

/// Supplies lines typed by the learner. May block for as long as it needs.
pub trait InputSource {
    fn read_line(&mut self, prompt: &str) -> Option<String>;
}

impl<F> InputSource for F
where
    F: FnMut(&str) -> Option<String>,
{
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        self(prompt)
    }
}

/// Consumes routed output.
pub trait OutputSink {
    type Reply;

    fn emit(&mut self, output: RoutedOutput) -> Self::Reply;
}

impl<F, R> OutputSink for F
where
    F: FnMut(RoutedOutput) -> R,
{
    type Reply = R;

    fn emit(&mut self, output: RoutedOutput) -> R {
        self(output)
    }
}

/// An [`OutputSink`] that keeps every routed event, for inspection after a run.
#[derive(Debug, Default)]
pub struct CollectOutput(Vec<RoutedOutput>);

impl CollectOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> &[RoutedOutput] {
        &self.0
    }

    /// All chunks of all events, in order.
    pub fn chunks(&self) -> impl Iterator<Item = &OutputChunk> {
        self.0.iter().flat_map(|event| &event.parts)
    }

    #[must_use]
    pub fn into_events(self) -> Vec<RoutedOutput> {
        self.0
    }
}

impl OutputSink for &mut CollectOutput {
    type Reply = ();

    fn emit(&mut self, output: RoutedOutput) {
        self.0.push(output);
    }
}

/// An [`InputSource`] answering from a fixed list of lines, then reporting
/// that input is exhausted.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }

    /// Prompts seen so far.
    #[must_use]
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

impl InputSource for &mut ScriptedInput {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        self.prompts.push(prompt.to_owned());
        self.lines.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_types_parse_from_engine_names() {
        assert_eq!(PartType::from_str("syntax_error"), Ok(PartType::SyntaxError));
        assert_eq!(PartType::from_str("input_prompt"), Ok(PartType::InputPrompt));
        assert_eq!(PartType::Traceback.to_string(), "traceback");
    }

    #[test]
    fn missing_and_unknown_types_are_contract_breaches() {
        let part: RawPart = serde_json::from_str(r#"{"text": "hi"}"#).unwrap();
        assert_eq!(part.kind(), Err(RouterError::MissingPartType));
        let part: RawPart = serde_json::from_str(r#"{"type": "html", "text": "hi"}"#).unwrap();
        assert_eq!(part.kind(), Err(RouterError::UnknownPartType("html".to_owned())));
    }

    #[test]
    fn chunk_omits_traceback_fields_when_unset() {
        let json = serde_json::to_value(OutputChunk::new("hi\n", Color::White)).unwrap();
        assert_eq!(json, serde_json::json!({"text": "hi\n", "color": "white"}));
    }

    #[test]
    fn engine_events_use_type_tags() {
        let event: EngineEvent =
            serde_json::from_str(r#"{"type": "output", "parts": [{"type": "stdout", "text": "1\n"}]}"#).unwrap();
        assert!(matches!(event, EngineEvent::Output { ref parts } if parts.len() == 1));
        let event: EngineEvent = serde_json::from_str(r#"{"type": "input"}"#).unwrap();
        assert!(matches!(event, EngineEvent::Input { ref prompt } if prompt.is_empty()));
    }
}
