//! Syntax highlighting configuration shared by every rendered traceback.
//!
//! Loading syntect's syntax and theme sets is the expensive part, so a
//! [`Highlighter`] is built once per process and shared behind an `Arc`. It is
//! never mutated after construction.

use std::ops::Range;

use html_escape::encode_text;
use syntect::{
    easy::HighlightLines,
    highlighting::{Style, Theme, ThemeSet},
    html::{IncludeBackground, styled_line_to_highlighted_html},
    parsing::{SyntaxReference, SyntaxSet},
    util::split_at,
};
use tracing::warn;

use crate::{config::LearntraceConfig, error::ConfigError};

/// One line handed to [`Highlighter::highlight_snippet`].
#[derive(Debug, Clone)]
pub struct HighlightLine<'a> {
    pub text: &'a str,
    /// Byte range of the expression being executed, if it touches this line.
    pub executing: Option<Range<usize>>,
    /// Program lines between the previous snippet line and this one. They
    /// only advance the highlighter state and produce no output.
    pub skipped: &'a [String],
}

#[derive(Debug)]
pub struct Highlighter {
    syntaxes: SyntaxSet,
    theme: Theme,
    executing_background: String,
}

impl Highlighter {
    pub fn new(theme_name: &str, executing_background: impl Into<String>) -> Result<Self, ConfigError> {
        let mut themes = ThemeSet::load_defaults();
        let theme = themes
            .themes
            .remove(theme_name)
            .ok_or_else(|| ConfigError::UnknownTheme(theme_name.to_owned()))?;
        Ok(Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            theme,
            executing_background: executing_background.into(),
        })
    }

    pub fn from_config(config: &LearntraceConfig) -> Result<Self, ConfigError> {
        Self::new(&config.theme, config.executing_background.clone())
    }

    fn python(&self) -> &SyntaxReference {
        self.syntaxes
            .find_syntax_by_extension("py")
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text())
    }

    /// Highlights consecutive lines of one snippet into HTML fragments.
    ///
    /// Lines share highlighter state, so a string literal opened on one line
    /// (or on a skipped line before it) stays a string on the next. Output is
    /// HTML-escaped; a line that fails to highlight falls back to plain
    /// escaped text.
    #[must_use]
    pub fn highlight_snippet(&self, lines: &[HighlightLine<'_>]) -> Vec<String> {
        let mut state = HighlightLines::new(self.python(), &self.theme);
        lines
            .iter()
            .map(|line| {
                for skipped in line.skipped {
                    if let Err(err) = state.highlight_line(&format!("{skipped}\n"), &self.syntaxes) {
                        warn!(%err, "highlighting skipped line failed");
                    }
                }
                let with_newline = format!("{}\n", line.text);
                match state.highlight_line(&with_newline, &self.syntaxes) {
                    Ok(ranges) => self.render_ranges(&ranges, line),
                    Err(err) => {
                        warn!(%err, "highlighting failed, rendering plain text");
                        self.render_plain(line)
                    }
                }
            })
            .collect()
    }

    fn render_ranges(&self, ranges: &[(Style, &str)], line: &HighlightLine<'_>) -> String {
        let ranges: Vec<(Style, &str)> = ranges
            .iter()
            .map(|&(style, text)| (style, text.strip_suffix('\n').unwrap_or(text)))
            .filter(|(_, text)| !text.is_empty())
            .collect();

        let Some(span) = clamp(line.executing.clone(), line.text) else {
            return to_html(&ranges).unwrap_or_else(|| self.render_plain(line));
        };
        let (before, rest) = split_at(&ranges, span.start);
        let (node, after) = split_at(&rest, span.end - span.start);
        match (to_html(&before), to_html(&node), to_html(&after)) {
            (Some(before), Some(node), Some(after)) => {
                format!("{before}{}{after}", self.wrap_executing(&node))
            }
            _ => self.render_plain(line),
        }
    }

    fn render_plain(&self, line: &HighlightLine<'_>) -> String {
        match clamp(line.executing.clone(), line.text) {
            Some(span) => format!(
                "{}{}{}",
                encode_text(&line.text[..span.start]),
                self.wrap_executing(&encode_text(&line.text[span.clone()])),
                encode_text(&line.text[span.end..])
            ),
            None => encode_text(line.text).into_owned(),
        }
    }

    fn wrap_executing(&self, html: &str) -> String {
        format!(
            "<span class=\"executing-node\" style=\"background-color:{};\">{html}</span>",
            self.executing_background
        )
    }
}

fn to_html(ranges: &[(Style, &str)]) -> Option<String> {
    styled_line_to_highlighted_html(ranges, IncludeBackground::No).ok()
}

/// Keeps a byte range inside `text` and on char boundaries; empty ranges are dropped.
fn clamp(span: Option<Range<usize>>, text: &str) -> Option<Range<usize>> {
    let span = span?;
    let end = span.end.min(text.len());
    let start = span.start.min(end);
    if start == end || !text.is_char_boundary(start) || !text.is_char_boundary(end) {
        return None;
    }
    Some(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn highlighter() -> Highlighter {
        Highlighter::from_config(&LearntraceConfig::default()).unwrap()
    }

    fn strip_tags(html: &str) -> String {
        let mut out = String::new();
        let mut in_tag = false;
        for ch in html.chars() {
            match ch {
                '<' => in_tag = true,
                '>' => in_tag = false,
                c if !in_tag => out.push(c),
                _ => {}
            }
        }
        out
    }

    #[test]
    fn unknown_theme_is_a_config_error() {
        let err = Highlighter::new("no-such-theme", "#000").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTheme(name) if name == "no-such-theme"));
    }

    #[test]
    fn output_is_escaped_and_keeps_text() {
        let lines = [HighlightLine {
            text: "if a < b and c > d:",
            executing: None,
            skipped: &[],
        }];
        let html = highlighter().highlight_snippet(&lines);
        assert!(!html[0].contains("a < b"), "markup must be escaped: {}", html[0]);
        assert_eq!(strip_tags(&html[0]), "if a &lt; b and c &gt; d:");
    }

    #[test]
    fn executing_range_is_wrapped() {
        let lines = [HighlightLine {
            text: "print(1 / 0)",
            executing: Some(6..11),
            skipped: &[],
        }];
        let html = &highlighter().highlight_snippet(&lines)[0];
        let start = html
            .find("<span class=\"executing-node\"")
            .expect("executing span present");
        let inner = strip_tags(&html[start..]);
        assert!(inner.starts_with("1 / 0"), "got {inner}");
        assert_eq!(strip_tags(html), "print(1 / 0)");
    }

    #[test]
    fn highlighting_is_deterministic() {
        let lines = [
            HighlightLine {
                text: "def f(x):",
                executing: None,
                skipped: &[],
            },
            HighlightLine {
                text: "    return x + 1",
                executing: Some(11..16),
                skipped: &[],
            },
        ];
        let h = highlighter();
        assert_eq!(h.highlight_snippet(&lines), h.highlight_snippet(&lines));
    }

    #[test]
    fn plain_fallback_escapes_and_wraps() {
        let line = HighlightLine {
            text: "if a<b: x = '&'",
            executing: Some(3..6),
            skipped: &[],
        };
        let html = highlighter().render_plain(&line);
        assert_eq!(
            html,
            "if <span class=\"executing-node\" style=\"background-color:#005080;\">a&lt;b</span>: x = '&amp;'"
        );
    }

    #[test]
    fn skipped_lines_carry_state_into_the_snippet() {
        let opening = ["text = \"\"\"".to_owned()];
        let inside = HighlightLine {
            text: "a = 1",
            executing: None,
            skipped: &opening,
        };
        let alone = HighlightLine { skipped: &[], ..inside.clone() };
        let h = highlighter();
        let in_string = h.highlight_snippet(&[inside]);
        let as_code = h.highlight_snippet(&[alone]);
        assert_ne!(in_string, as_code);
        assert_eq!(strip_tags(&in_string[0]), "a = 1");
    }
}
