//! Tests for routing engine events to the output consumer.

use std::sync::Arc;

use learntrace::{
    CodeInfo, CollectOutput, Color, EngineEvent, EngineTranscript, EventReply, EventSink, ExecutionEngine,
    Highlighter, LearntraceConfig, OutputChunk, OutputEventRouter, PartType, ProgramSource, RaisedException, RawFrame,
    RawPart, ReplayEngine, RoutedOutput, RouterError, ScriptedInput, TracebackSerializer,
};
use pretty_assertions::assert_eq;

const PROGRAM: &str = "name = input('name? ')\nprint('hi ' + name)\nprint(1 / 0)\n";

fn serializer() -> TracebackSerializer {
    let config = LearntraceConfig::default();
    let highlighter = Highlighter::from_config(&config).unwrap();
    TracebackSerializer::new(Arc::new(config), Arc::new(highlighter)).unwrap()
}

fn output(parts: Vec<RawPart>) -> EngineEvent {
    EngineEvent::Output { parts }
}

fn zero_division() -> RaisedException {
    RaisedException::new("ZeroDivisionError", "division by zero").with_traceback([
        RawFrame::new("/engine/runner.py", CodeInfo::new(900, "execute"), 40),
        RawFrame::new("my_program.py", CodeInfo::module(0), 3),
    ])
}

// =============================================================================
// 1. Output classification
// =============================================================================

/// Each part is colored by its type and echoed input never reaches the sink.
#[test]
fn parts_are_colored_and_input_echo_dropped() {
    let serializer = serializer();
    let source = ProgramSource::new(PROGRAM);
    let mut collected = CollectOutput::new();
    let mut input = ScriptedInput::new(Vec::<String>::new());
    let mut router = OutputEventRouter::new(&serializer, &source, "editor", &mut input, &mut collected);

    let reply = router
        .handle(output(vec![
            RawPart::new(PartType::InputPrompt, "name? "),
            RawPart::new(PartType::Input, "bob\n"),
            RawPart::new(PartType::Stdout, "hi bob\n"),
            RawPart::new(PartType::Stderr, "warning\n"),
            RawPart::new(PartType::SyntaxError, "bad syntax\n"),
        ]))
        .unwrap();
    assert_eq!(reply, EventReply::Output(()));
    assert_eq!(router.captured_output(), "name? hi bob\nwarning\nbad syntax\n");
    drop(router);

    assert_eq!(collected.events().len(), 1);
    let chunks: Vec<&OutputChunk> = collected.chunks().collect();
    assert_eq!(
        chunks,
        vec![
            &OutputChunk::new("name? ", Color::White),
            &OutputChunk::new("hi bob\n", Color::White),
            &OutputChunk::new("warning\n", Color::Red),
            &OutputChunk::new("bad syntax\n", Color::Red),
        ]
    );
}

/// Traceback parts carry the serialized chain and the run mode.
#[test]
fn traceback_parts_carry_serialized_chain() {
    let serializer = serializer();
    let source = ProgramSource::new(PROGRAM);
    let mut collected = CollectOutput::new();
    let mut input = ScriptedInput::new(Vec::<String>::new());
    let mut router = OutputEventRouter::new(&serializer, &source, "shell", &mut input, &mut collected);

    let text = "Traceback (most recent call last):\nZeroDivisionError: division by zero\n";
    router.handle(output(vec![RawPart::traceback(text, zero_division())])).unwrap();
    assert_eq!(router.captured_output(), text);
    drop(router);

    let chunk = collected.chunks().next().unwrap();
    assert_eq!(chunk.color, Color::Red);
    assert!(chunk.is_traceback);
    assert_eq!(chunk.code_source.as_deref(), Some("shell"));
    let records = chunk.tracebacks.as_ref().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].exception_type, "ZeroDivisionError");
    assert_eq!(records[0].frames.len(), 1);

    let json = serde_json::to_value(chunk).unwrap();
    assert_eq!(json["isTraceback"], true);
    assert_eq!(json["codeSource"], "shell");
    assert_eq!(json["tracebacks"][0]["exceptionType"], "ZeroDivisionError");
}

// =============================================================================
// 2. Contract breaches
// =============================================================================

/// A part without a type is reported, not dropped.
#[test]
fn untyped_part_is_an_error() {
    let serializer = serializer();
    let source = ProgramSource::new(PROGRAM);
    let mut collected = CollectOutput::new();
    let mut input = ScriptedInput::new(Vec::<String>::new());
    let mut router = OutputEventRouter::new(&serializer, &source, "editor", &mut input, &mut collected);

    let event: EngineEvent = serde_json::from_str(r#"{"type": "output", "parts": [{"text": "?"}]}"#).unwrap();
    assert_eq!(router.handle(event), Err(RouterError::MissingPartType));

    let event: EngineEvent =
        serde_json::from_str(r#"{"type": "output", "parts": [{"type": "html", "text": "?"}]}"#).unwrap();
    assert_eq!(router.handle(event), Err(RouterError::UnknownPartType("html".to_owned())));
    drop(router);
    assert!(collected.events().is_empty());
}

/// A traceback part must come with its exception.
#[test]
fn traceback_without_exception_is_an_error() {
    let serializer = serializer();
    let source = ProgramSource::new(PROGRAM);
    let mut collected = CollectOutput::new();
    let mut input = ScriptedInput::new(Vec::<String>::new());
    let mut router = OutputEventRouter::new(&serializer, &source, "editor", &mut input, &mut collected);

    let result = router.handle(output(vec![RawPart::new(PartType::Traceback, "Traceback...\n")]));
    assert_eq!(result, Err(RouterError::MissingException));
}

// =============================================================================
// 3. Input
// =============================================================================

/// Lines handed back to the engine always end in a newline.
#[test]
fn input_lines_are_newline_terminated() {
    let serializer = serializer();
    let source = ProgramSource::new(PROGRAM);
    let mut collected = CollectOutput::new();
    let mut input = ScriptedInput::new(["bob", "alice\n"]);
    let mut router = OutputEventRouter::new(&serializer, &source, "editor", &mut input, &mut collected);

    let ask = || EngineEvent::Input {
        prompt: "name? ".to_owned(),
    };
    assert_eq!(router.handle(ask()), Ok(EventReply::Input(Some("bob\n".to_owned()))));
    assert_eq!(router.handle(ask()), Ok(EventReply::Input(Some("alice\n".to_owned()))));
    assert_eq!(router.handle(ask()), Ok(EventReply::Input(None)));
    assert_eq!(router.captured_output(), "");
    drop(router);
    assert_eq!(input.prompts(), ["name? ", "name? ", "name? "]);
}

/// Closures work as input sources and output sinks, and the sink's reply is
/// handed back to the engine.
#[test]
fn closures_as_collaborators() {
    let serializer = serializer();
    let source = ProgramSource::new(PROGRAM);
    let mut seen = Vec::new();
    let mut router = OutputEventRouter::new(
        &serializer,
        &source,
        "editor",
        |_prompt: &str| Some("42".to_owned()),
        |routed: RoutedOutput| {
            seen.push(routed.parts.len());
            seen.len()
        },
    );
    assert_eq!(
        router.handle(output(vec![RawPart::new(PartType::Stdout, "a\n")])),
        Ok(EventReply::Output(1))
    );
    assert_eq!(
        router.handle(EngineEvent::Input { prompt: String::new() }),
        Ok(EventReply::Input(Some("42\n".to_owned())))
    );
    drop(router);
    assert_eq!(seen, vec![1]);
}

/// The shell prompt reaches the sink and the captured output alike.
#[test]
fn shell_prompt_is_captured_as_output() {
    let serializer = serializer();
    let source = ProgramSource::new(PROGRAM);
    let mut collected = CollectOutput::new();
    let mut input = ScriptedInput::new(Vec::<String>::new());
    let mut router = OutputEventRouter::new(&serializer, &source, "editor", &mut input, &mut collected);

    router.handle(output(vec![RawPart::new(PartType::Stdout, "1\n")])).unwrap();
    router.emit_prompt(">>> ");
    assert_eq!(router.into_captured_output(), "1\n>>> ");
    let last = collected.events().last().unwrap();
    assert_eq!(last.parts, vec![OutputChunk::new(">>> ", Color::White)]);
}

// =============================================================================
// 4. Replayed runs
// =============================================================================

/// A whole recorded run routed end to end.
#[test]
fn replayed_transcript_through_router() {
    let transcript: EngineTranscript = serde_json::from_value(serde_json::json!({
        "events": [
            {"type": "output", "parts": [{"type": "input_prompt", "text": "name? "}]},
            {"type": "input", "prompt": "name? "},
            {"type": "output", "parts": [
                {"type": "input", "text": "bob\n"},
                {"type": "stdout", "text": "hi bob\n"},
            ]},
            {"type": "output", "parts": [{
                "type": "traceback",
                "text": "ZeroDivisionError: division by zero\n",
                "exception": {
                    "typeName": "ZeroDivisionError",
                    "message": "division by zero",
                    "traceback": [{"filename": "my_program.py", "code": {"id": 0, "name": "<module>"}, "lineno": 3}],
                },
            }]},
        ],
    }))
    .unwrap();

    let serializer = serializer();
    let source = ProgramSource::new(PROGRAM);
    let mut collected = CollectOutput::new();
    let mut input = ScriptedInput::new(["bob"]);
    let mut engine = ReplayEngine::new(transcript);
    let mut router = OutputEventRouter::new(&serializer, &source, "editor", &mut input, &mut collected);

    let outcome = engine.run("editor", PROGRAM, &mut router).unwrap();
    assert!(!outcome.interrupted);
    assert_eq!(
        router.into_captured_output(),
        "name? hi bob\nZeroDivisionError: division by zero\n"
    );
    assert_eq!(engine.inputs(), ["bob\n"]);
    assert_eq!(collected.events().len(), 3);
    let tracebacks: Vec<bool> = collected.chunks().map(|chunk| chunk.is_traceback).collect();
    assert_eq!(tracebacks, vec![false, false, true]);
}
