//! The display-ready tree produced for one exception chain.
//!
//! Everything here serializes to the JSON shape the front end consumes:
//! camelCase keys, and a `kind` tag on the two closed unions
//! ([`StackEntry`] and [`SourceLine`]).

use serde::{Deserialize, Serialize};

/// One exception of a serialized chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionRecord {
    pub frames: Vec<StackEntry>,
    pub exception_type: String,
    pub exception_message: String,
    /// Phrase linking this record to the next one in the chain; empty on the
    /// last record.
    pub tail_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StackEntry {
    Frame(FrameEntry),
    RepeatedFrames(RepeatedFrameGroup),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameEntry {
    pub name: String,
    pub variables: Vec<VariableEntry>,
    pub lines: Vec<SourceLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableEntry {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SourceLine {
    Line(LineEntry),
    LineGap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEntry {
    pub lineno: u32,
    pub is_current: bool,
    /// Highlighted, HTML-escaped source with the snippet's indentation removed.
    pub content: String,
}

/// Counted summary of a collapsed run of recurring stack entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatedFrameGroup {
    /// Sorted by descending `count`, then ascending `name`.
    pub rows: Vec<RepeatedFrameRow>,
}

impl RepeatedFrameGroup {
    /// Total number of stack entries the group stands for.
    #[must_use]
    pub fn total(&self) -> usize {
        self.rows.iter().map(|row| row.count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatedFrameRow {
    pub name: String,
    pub lineno: u32,
    pub count: usize,
}
