//! K-way merge over sorted record streams.
//!
//! Produces `(key, Value)` pairs in ascending key order. Inputs are given in
//! priority order: when the same key appears in several inputs, the record
//! from the input with the lowest index wins and the rest are dropped.
//!
//! This is the core primitive for both compaction and range scans.

use memtable::Value;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::SSTableError;

/// The head record of one input, waiting in the heap.
struct HeapEntry {
    key: u64,
    /// Index into `inputs`; lower means higher priority.
    input: usize,
    value: Value,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.input == other.input
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse both keys so the smallest key,
        // then the lowest input index, comes out first.
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.input.cmp(&self.input))
    }
}

/// Merges several ascending streams into one deduplicated ascending stream.
pub struct MergeIterator<I>
where
    I: Iterator<Item = Result<(u64, Value), SSTableError>>,
{
    inputs: Vec<I>,
    /// Last key pulled from each input, for order checking.
    last: Vec<Option<u64>>,
    heap: BinaryHeap<HeapEntry>,
    failed: bool,
}

impl<I> MergeIterator<I>
where
    I: Iterator<Item = Result<(u64, Value), SSTableError>>,
{
    /// Primes the heap with the first record of every input.
    ///
    /// # Errors
    ///
    /// Propagates the first error any input yields.
    pub fn new(inputs: Vec<I>) -> Result<Self, SSTableError> {
        let mut merge = Self {
            last: vec![None; inputs.len()],
            heap: BinaryHeap::with_capacity(inputs.len()),
            inputs,
            failed: false,
        };
        for input in 0..merge.inputs.len() {
            merge.advance(input)?;
        }
        Ok(merge)
    }

    /// Pulls the next record of `input` into the heap.
    fn advance(&mut self, input: usize) -> Result<(), SSTableError> {
        let (key, value) = match self.inputs[input].next() {
            Some(item) => item?,
            None => return Ok(()),
        };
        if let Some(previous) = self.last[input] {
            if key <= previous {
                return Err(SSTableError::MisorderedInput {
                    input,
                    previous,
                    key,
                });
            }
        }
        self.last[input] = Some(key);
        self.heap.push(HeapEntry { key, input, value });
        Ok(())
    }

    /// Returns the next surviving record, or `None` once every input is
    /// exhausted.
    pub fn next_entry(&mut self) -> Result<Option<(u64, Value)>, SSTableError> {
        let top = match self.heap.pop() {
            Some(top) => top,
            None => return Ok(None),
        };
        self.advance(top.input)?;

        // Shadowed copies of the same key from lower-priority inputs.
        while self.heap.peek().map_or(false, |e| e.key == top.key) {
            if let Some(dup) = self.heap.pop() {
                self.advance(dup.input)?;
            }
        }

        Ok(Some((top.key, top.value)))
    }

    /// Collects all remaining records.
    pub fn collect_all(&mut self) -> Result<Vec<(u64, Value)>, SSTableError> {
        let mut out = Vec::new();
        while let Some(pair) = self.next_entry()? {
            out.push(pair);
        }
        Ok(out)
    }
}

impl<I> Iterator for MergeIterator<I>
where
    I: Iterator<Item = Result<(u64, Value), SSTableError>>,
{
    type Item = Result<(u64, Value), SSTableError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_entry() {
            Ok(Some(pair)) => Some(Ok(pair)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
