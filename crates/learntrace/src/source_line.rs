use crate::{
    highlight::{HighlightLine, Highlighter},
    record::LineEntry,
};

/// The learner program's source text, split into lines for lookup by number.
#[derive(Debug, Clone, Default)]
pub struct ProgramSource {
    lines: Vec<String>,
}

impl ProgramSource {
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_owned).collect(),
        }
    }

    /// Line `lineno` (1-based), if the program has it.
    #[must_use]
    pub fn line(&self, lineno: u32) -> Option<&str> {
        let index = usize::try_from(lineno).ok()?.checked_sub(1)?;
        self.lines.get(index).map(String::as_str)
    }

    /// Lines strictly between `after` and `before`, both 1-based.
    #[must_use]
    pub fn between(&self, after: u32, before: u32) -> &[String] {
        let start = usize::try_from(after).unwrap_or(usize::MAX).min(self.lines.len());
        let end = usize::try_from(before)
            .unwrap_or(usize::MAX)
            .saturating_sub(1)
            .min(self.lines.len());
        self.lines.get(start..end).unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A raw line waiting to be rendered.
#[derive(Debug, Clone, Copy)]
pub struct SnippetLine<'a> {
    pub lineno: u32,
    pub text: &'a str,
    pub is_current: bool,
    /// Character columns of the executing expression on this line; `None` as
    /// the end means "to the end of the line".
    pub executing: Option<(u32, Option<u32>)>,
}

/// Renders source lines into [`LineEntry`] values.
#[derive(Debug, Clone, Copy)]
pub struct SourceLineRenderer<'h> {
    highlighter: &'h Highlighter,
}

impl<'h> SourceLineRenderer<'h> {
    #[must_use]
    pub const fn new(highlighter: &'h Highlighter) -> Self {
        Self { highlighter }
    }

    /// Renders a single line on its own.
    #[must_use]
    pub fn render(&self, line: SnippetLine<'_>) -> LineEntry {
        self.render_snippet(&[line]).remove(0)
    }

    /// Renders the lines of one snippet together.
    ///
    /// Indentation shared by every non-blank line of the snippet is stripped,
    /// so a line nested deep in a function starts at column zero.
    #[must_use]
    pub fn render_snippet(&self, lines: &[SnippetLine<'_>]) -> Vec<LineEntry> {
        self.render_lines(lines, None)
    }

    /// Like [`render_snippet`](Self::render_snippet), but highlights as if
    /// from the top of `program`, so a line inside a string or bracket opened
    /// earlier is colored as such.
    #[must_use]
    pub fn render_in_program(&self, program: &ProgramSource, lines: &[SnippetLine<'_>]) -> Vec<LineEntry> {
        self.render_lines(lines, Some(program))
    }

    fn render_lines(&self, lines: &[SnippetLine<'_>], program: Option<&ProgramSource>) -> Vec<LineEntry> {
        let indent = common_indent(lines.iter().map(|line| line.text));
        let dedented: Vec<&str> = lines.iter().map(|line| strip_indent(line.text, indent)).collect();
        let previous = std::iter::once(0).chain(lines.iter().map(|line| line.lineno));
        let to_highlight: Vec<HighlightLine<'_>> = lines
            .iter()
            .zip(&dedented)
            .zip(previous)
            .map(|((line, &text), previous)| HighlightLine {
                text,
                skipped: program.map_or(&[][..], |program| program.between(previous, line.lineno)),
                executing: line.executing.map(|(start, end)| {
                    let start = char_to_byte(text, dedent_column(start, indent));
                    let end = end.map_or(text.len(), |end| char_to_byte(text, dedent_column(end, indent)));
                    start..end
                }),
            })
            .collect();
        let contents = self.highlighter.highlight_snippet(&to_highlight);
        lines
            .iter()
            .zip(contents)
            .map(|(line, content)| LineEntry {
                lineno: line.lineno,
                is_current: line.is_current,
                content,
            })
            .collect()
    }
}

/// Smallest leading whitespace (in characters) over the non-blank lines.
fn common_indent<'a>(lines: impl Iterator<Item = &'a str>) -> usize {
    lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0)
}

fn strip_indent(line: &str, indent: usize) -> &str {
    let cut = line
        .char_indices()
        .take(indent)
        .take_while(|(_, c)| c.is_whitespace())
        .last()
        .map_or(0, |(i, c)| i + c.len_utf8());
    &line[cut..]
}

fn dedent_column(column: u32, indent: usize) -> usize {
    usize::try_from(column).unwrap_or(usize::MAX).saturating_sub(indent)
}

fn char_to_byte(text: &str, column: usize) -> usize {
    text.char_indices().nth(column).map_or(text.len(), |(i, _)| i)
}
