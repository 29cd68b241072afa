//! Page content buffer: an ordered list of opaque drawing instructions.
//!
//! Page finalization moves runs of instructions around (holds crop marks back,
//! hoists the bleed transform to the front). Those moves are expressed with
//! [`ContentBuffer::take`], [`ContentBuffer::remove_from`] and
//! [`ContentBuffer::insert_at`] over [`Segment`]s instead of raw slicing.

use std::ops::Range;

/// One encoded instruction, e.g. `q`, `1 0 0 1 36 36 cm` or `0 0 m 10 0 l S`.
pub type Instruction = Vec<u8>;

/// A detached run of instructions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment(Vec<Instruction>);

impl Segment {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentBuffer {
    ops: Vec<Instruction>,
}

impl ContentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn push(&mut self, op: impl Into<Instruction>) {
        self.ops.push(op.into());
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.ops
    }

    /// Copies `range` out without touching the buffer. Out-of-range bounds are clipped.
    pub fn take(&self, range: Range<usize>) -> Segment {
        let range = self.clip(range);
        Segment(self.ops[range].to_vec())
    }

    /// Removes `range` and returns it. Out-of-range bounds are clipped.
    pub fn remove_range(&mut self, range: Range<usize>) -> Segment {
        let range = self.clip(range);
        Segment(self.ops.drain(range).collect())
    }

    /// Removes everything from `start` to the end.
    pub fn remove_from(&mut self, start: usize) -> Segment {
        self.remove_range(start..self.ops.len())
    }

    /// Splices `segment` in before position `pos` (clamped to the end).
    pub fn insert_at(&mut self, pos: usize, segment: Segment) {
        let pos = pos.min(self.ops.len());
        self.ops.splice(pos..pos, segment.0);
    }

    pub fn append(&mut self, segment: Segment) {
        self.ops.extend(segment.0);
    }

    /// Joins instructions with newlines. Each instruction has its own trailing
    /// whitespace stripped first.
    pub fn to_bytes(&self) -> Vec<u8> {
        join_instructions(&self.ops)
    }

    fn clip(&self, range: Range<usize>) -> Range<usize> {
        let end = range.end.min(self.ops.len());
        range.start.min(end)..end
    }
}

impl From<Vec<Instruction>> for ContentBuffer {
    fn from(ops: Vec<Instruction>) -> Self {
        Self { ops }
    }
}

pub(crate) fn join_instructions<'a>(ops: impl IntoIterator<Item = &'a Instruction>) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, op) in ops.into_iter().enumerate() {
        if i > 0 {
            out.push(b'\n');
        }
        let end = op
            .iter()
            .rposition(|b| !b.is_ascii_whitespace())
            .map_or(0, |p| p + 1);
        // whitespace-only instructions (the stream terminator) are kept verbatim
        if end == 0 {
            out.extend_from_slice(op);
        } else {
            out.extend_from_slice(&op[..end]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(ops: &[&str]) -> ContentBuffer {
        ops.iter().map(|s| s.as_bytes().to_vec()).collect::<Vec<_>>().into()
    }

    fn text(buffer: &ContentBuffer) -> Vec<String> {
        buffer
            .instructions()
            .iter()
            .map(|op| String::from_utf8_lossy(op).into_owned())
            .collect()
    }

    #[test]
    fn take_leaves_buffer_untouched() {
        let b = buf(&["a", "b", "c"]);
        let seg = b.take(1..3);
        assert_eq!(seg.len(), 2);
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn hoist_tail_to_front() {
        let mut b = buf(&["draw1", "draw2", "q", "cm"]);
        let tail = b.remove_from(2);
        b.insert_at(0, tail);
        assert_eq!(text(&b), ["q", "cm", "draw1", "draw2"]);
    }

    #[test]
    fn hold_back_and_append() {
        let mut b = buf(&["draw", "marks"]);
        let held = b.remove_from(1);
        b.push("Q");
        b.append(held);
        assert_eq!(text(&b), ["draw", "Q", "marks"]);
    }

    #[test]
    fn out_of_range_is_clipped() {
        let mut b = buf(&["a", "b"]);
        assert!(b.remove_range(5..9).is_empty());
        assert!(b.remove_from(2).is_empty());
        b.insert_at(10, buf(&["z"]).remove_from(0));
        assert_eq!(text(&b), ["a", "b", "z"]);
    }

    #[test]
    fn joins_with_newlines() {
        let b = buf(&["q\n", "0 0 m\n10 0 l\nS\n", " "]);
        assert_eq!(b.to_bytes(), b"q\n0 0 m\n10 0 l\nS\n ".to_vec());
    }
}
