//! Formatting of individual stack frames.
//!
//! The formatter is also the privacy boundary: frames that do not belong to
//! the learner's program (the engine's own machinery, library code) are never
//! formatted at all.

use tracing::warn;

use crate::{
    config::ContextWindow,
    exception::RawFrame,
    record::{FrameEntry, SourceLine, VariableEntry},
    repr::SafeRepr,
    source_line::{ProgramSource, SnippetLine, SourceLineRenderer},
};

#[derive(Debug, Clone, Copy)]
pub struct FrameFormatter<'a> {
    program_filename: &'a str,
    context: ContextWindow,
    repr: SafeRepr,
    lines: SourceLineRenderer<'a>,
    source: &'a ProgramSource,
}

impl<'a> FrameFormatter<'a> {
    #[must_use]
    pub const fn new(
        program_filename: &'a str,
        context: ContextWindow,
        repr: SafeRepr,
        lines: SourceLineRenderer<'a>,
        source: &'a ProgramSource,
    ) -> Self {
        Self {
            program_filename,
            context,
            repr,
            lines,
            source,
        }
    }

    /// Whether `frame` runs code from the learner's program.
    #[must_use]
    pub fn is_program_frame(&self, frame: &RawFrame) -> bool {
        frame.filename == self.program_filename
    }

    /// Formats `frame`, or returns `None` when it belongs to anything other
    /// than the learner's program.
    #[must_use]
    pub fn format(&self, frame: &RawFrame) -> Option<FrameEntry> {
        if !self.is_program_frame(frame) {
            return None;
        }
        Some(FrameEntry {
            name: frame.code.display_name().to_owned(),
            variables: self.format_variables(frame),
            lines: self.format_lines(frame),
        })
    }

    fn format_variables(&self, frame: &RawFrame) -> Vec<VariableEntry> {
        let mut variables: Vec<VariableEntry> = frame
            .locals
            .iter()
            .map(|(name, value)| VariableEntry {
                name: name.clone(),
                value: self.repr.render(value),
            })
            .collect();
        variables.sort_by(|a, b| a.name.cmp(&b.name));
        variables
    }

    fn format_lines(&self, frame: &RawFrame) -> Vec<SourceLine> {
        let numbers = self.shown_line_numbers(frame);
        let snippet: Vec<SnippetLine<'_>> = numbers
            .iter()
            .filter_map(|&lineno| {
                let text = self.source.line(lineno)?;
                Some(SnippetLine {
                    lineno,
                    text,
                    is_current: lineno == frame.lineno,
                    executing: frame.executing.and_then(|range| range.columns_on(lineno)),
                })
            })
            .collect();

        let mut lines = Vec::with_capacity(snippet.len() + 1);
        let mut previous: Option<u32> = None;
        for entry in self.lines.render_in_program(self.source, &snippet) {
            if previous.is_some_and(|prev| entry.lineno > prev + 1) {
                lines.push(SourceLine::LineGap);
            }
            previous = Some(entry.lineno);
            lines.push(SourceLine::Line(entry));
        }
        lines
    }

    /// Line numbers to show: the executing statement widened by the context
    /// window, plus the signature line when requested. Never reaches past the
    /// end of the program.
    fn shown_line_numbers(&self, frame: &RawFrame) -> Vec<u32> {
        let available = u32::try_from(self.source.len()).unwrap_or(u32::MAX);
        let (first, last) = frame.statement_lines();
        if last > available {
            warn!(
                lineno = frame.lineno,
                last,
                source_lines = available,
                "frame refers to lines missing from the program source"
            );
        }
        let start = first.saturating_sub(self.context.before).max(1);
        let end = last.saturating_add(self.context.after).min(available);
        let mut numbers: Vec<u32> = (start..=end).collect();
        let signature = frame.code.first_lineno;
        if self.context.include_signature && signature >= 1 && signature < start && signature <= available {
            numbers.insert(0, signature);
        }
        numbers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::LearntraceConfig,
        exception::{CodeInfo, CodeLoc, CodeRange},
        highlight::Highlighter,
        value::Value,
    };

    const PROGRAM: &str = "\
def greet(name):
    greeting = 'hi ' + name

    return greeting.upper(
        1,
    )

greet('bob')
";

    fn with_formatter(context: ContextWindow, check: impl FnOnce(&FrameFormatter<'_>)) {
        let config = LearntraceConfig::default();
        let highlighter = Highlighter::from_config(&config).unwrap();
        let source = ProgramSource::new(PROGRAM);
        let formatter = FrameFormatter::new(
            &config.program_filename,
            context,
            SafeRepr::new(config.repr),
            SourceLineRenderer::new(&highlighter),
            &source,
        );
        check(&formatter);
    }

    fn greet_frame() -> RawFrame {
        RawFrame::new(
            "my_program.py",
            CodeInfo::new(1, "greet").with_qualname("greet").with_first_lineno(1),
            4,
        )
        .with_statement(4, 6)
        .with_executing(CodeRange::new(CodeLoc::new(4, 11), CodeLoc::new(6, 5)))
        .with_local("name", "bob")
        .with_local("greeting", "hi bob")
    }

    #[test]
    fn foreign_frames_are_skipped() {
        with_formatter(ContextWindow::default(), |formatter| {
            let frame = RawFrame::new("/usr/lib/engine/runner.py", CodeInfo::new(9, "execute"), 120);
            assert!(formatter.format(&frame).is_none());
        });
    }

    #[test]
    fn variables_are_sorted_and_rendered_safely() {
        with_formatter(ContextWindow::default(), |formatter| {
            let frame = greet_frame().with_local("again", Value::List(vec![Value::Int(1)]));
            let entry = formatter.format(&frame).unwrap();
            let names: Vec<&str> = entry.variables.iter().map(|v| v.name.as_str()).collect();
            assert_eq!(names, vec!["again", "greeting", "name"]);
            assert_eq!(entry.variables[2].value, "'bob'");
            assert_eq!(entry.variables[0].value, "[1]");
        });
    }

    #[test]
    fn multi_line_statement_is_shown_without_gaps() {
        with_formatter(ContextWindow::default(), |formatter| {
            let entry = formatter.format(&greet_frame()).unwrap();
            assert_eq!(entry.name, "greet");
            let numbers: Vec<(u32, bool)> = entry
                .lines
                .iter()
                .map(|line| match line {
                    SourceLine::Line(line) => (line.lineno, line.is_current),
                    SourceLine::LineGap => panic!("no gap expected"),
                })
                .collect();
            assert_eq!(numbers, vec![(4, true), (5, false), (6, false)]);
        });
    }

    #[test]
    fn signature_line_is_separated_by_a_gap() {
        let context = ContextWindow {
            include_signature: true,
            ..ContextWindow::default()
        };
        with_formatter(context, |formatter| {
            let frame = RawFrame::new("my_program.py", CodeInfo::new(1, "greet").with_first_lineno(1), 4);
            let entry = formatter.format(&frame).unwrap();
            assert!(matches!(
                entry.lines.as_slice(),
                [SourceLine::Line(sig), SourceLine::LineGap, SourceLine::Line(current)]
                    if sig.lineno == 1 && !sig.is_current && current.lineno == 4 && current.is_current
            ));
        });
    }

    #[test]
    fn qualname_falls_back_to_bare_name() {
        with_formatter(ContextWindow::default(), |formatter| {
            let frame = RawFrame::new("my_program.py", CodeInfo::module(0), 8);
            assert_eq!(formatter.format(&frame).unwrap().name, "<module>");
        });
    }

    #[test]
    fn oversized_statement_span_stops_at_the_last_line() {
        with_formatter(ContextWindow::default(), |formatter| {
            let frame = RawFrame::new("my_program.py", CodeInfo::module(0), 8).with_statement(8, u32::MAX);
            let numbers: Vec<u32> = formatter
                .format(&frame)
                .unwrap()
                .lines
                .iter()
                .filter_map(|line| match line {
                    SourceLine::Line(line) => Some(line.lineno),
                    SourceLine::LineGap => None,
                })
                .collect();
            assert_eq!(numbers, vec![8]);
            assert_eq!(formatter.shown_line_numbers(&frame), vec![8]);
        });
    }

    #[test]
    fn lines_past_the_end_of_source_are_dropped() {
        with_formatter(ContextWindow::default(), |formatter| {
            let frame = RawFrame::new("my_program.py", CodeInfo::module(0), 99);
            assert!(formatter.format(&frame).unwrap().lines.is_empty());
        });
    }
}
