//! Collapsing of recurring stack entries.
//!
//! Learners write unbounded recursion all the time; an uncollapsed trace of
//! such a program is thousands of identical frames. Every entry whose
//! (code, line) key occurs at least `min_repeats` times in the stack is
//! "recurring", and each maximal consecutive run of recurring entries is
//! summarized by one [`RepeatedFrameGroup`].

use std::{cmp::Reverse, collections::HashMap};

use indexmap::IndexMap;

use crate::{
    exception::{CodeId, RawFrame},
    record::{RepeatedFrameGroup, RepeatedFrameRow},
};

/// A stack entry after collapsing.
#[derive(Debug, Clone)]
pub enum StackItem<'a> {
    Frame(&'a RawFrame),
    Repeated(RepeatedFrameGroup),
}

/// Collapses `frames` (outermost first) into frames and repeated groups.
#[must_use]
pub fn collapse_repeated<'a>(frames: &[&'a RawFrame], min_repeats: usize) -> Vec<StackItem<'a>> {
    let mut counts: HashMap<(CodeId, u32), usize> = HashMap::new();
    for frame in frames {
        *counts.entry(frame.key()).or_default() += 1;
    }

    let mut items = Vec::new();
    let mut run: Vec<&RawFrame> = Vec::new();
    for &frame in frames {
        if counts[&frame.key()] >= min_repeats {
            run.push(frame);
        } else {
            if !run.is_empty() {
                items.push(StackItem::Repeated(summarize(&run)));
                run.clear();
            }
            items.push(StackItem::Frame(frame));
        }
    }
    if !run.is_empty() {
        items.push(StackItem::Repeated(summarize(&run)));
    }
    items
}

/// Counts each (code, line) pair of a run, most frequent first.
fn summarize(run: &[&RawFrame]) -> RepeatedFrameGroup {
    let mut counts: IndexMap<(CodeId, u32), RepeatedFrameRow> = IndexMap::new();
    for frame in run {
        counts
            .entry(frame.key())
            .or_insert_with(|| RepeatedFrameRow {
                name: frame.code.name.clone(),
                lineno: frame.lineno,
                count: 0,
            })
            .count += 1;
    }
    let mut rows: Vec<RepeatedFrameRow> = counts.into_values().collect();
    rows.sort_by(|a, b| Reverse(a.count).cmp(&Reverse(b.count)).then_with(|| a.name.cmp(&b.name)));
    RepeatedFrameGroup { rows }
}
