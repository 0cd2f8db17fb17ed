//! Arena-backed skip list keyed by `u64`.
//!
//! ```text
//! Level 3:  HEAD ──────────────────────────────► 50 ──────────► NIL
//! Level 2:  HEAD ──────────► 20 ────────────────► 50 ──────────► NIL
//! Level 1:  HEAD ──► 10 ──► 20 ────► 35 ────────► 50 ──► 60 ──► NIL
//! Level 0:  HEAD ──► 10 ──► 20 ──► 25 ──► 35 ──► 50 ──► 60 ──► 70 ► NIL
//! ```
//!
//! Nodes live in a `Vec` and link to each other by index. Slot 0 is the head
//! sentinel. Unlinked slots go on a free list and are reused by later inserts.

use crate::level_gen::LevelGenerator;
use crate::Value;

/// Maximum height of a node.
pub const MAX_LEVEL: usize = 8;

const HEAD: usize = 0;

struct Node {
    key: u64,
    value: Value,
    forward: [Option<usize>; MAX_LEVEL],
}

pub struct SkipList {
    nodes: Vec<Node>,
    free: Vec<usize>,
    len: usize,
    generator: Box<dyn LevelGenerator>,
}

impl SkipList {
    pub fn new(generator: Box<dyn LevelGenerator>) -> Self {
        Self {
            nodes: vec![Self::head()],
            free: Vec::new(),
            len: 0,
            generator,
        }
    }

    fn head() -> Node {
        Node {
            key: 0,
            value: Value::Tombstone,
            forward: [None; MAX_LEVEL],
        }
    }

    /// For each level, the last node whose key is strictly less than `key`.
    fn predecessors(&self, key: u64) -> [usize; MAX_LEVEL] {
        let mut update = [HEAD; MAX_LEVEL];
        let mut x = HEAD;
        for lvl in (0..MAX_LEVEL).rev() {
            while let Some(next) = self.nodes[x].forward[lvl] {
                if self.nodes[next].key < key {
                    x = next;
                } else {
                    break;
                }
            }
            update[lvl] = x;
        }
        update
    }

    /// First node whose key is `>= key`.
    fn lower_bound(&self, key: u64) -> Option<usize> {
        let mut x = HEAD;
        for lvl in (0..MAX_LEVEL).rev() {
            while let Some(next) = self.nodes[x].forward[lvl] {
                if self.nodes[next].key < key {
                    x = next;
                } else {
                    break;
                }
            }
        }
        self.nodes[x].forward[0]
    }

    pub fn get(&self, key: u64) -> Option<&Value> {
        self.lower_bound(key)
            .filter(|&idx| self.nodes[idx].key == key)
            .map(|idx| &self.nodes[idx].value)
    }

    /// Inserts or overwrites. Returns the previous value on overwrite.
    pub fn insert(&mut self, key: u64, value: Value) -> Option<Value> {
        let update = self.predecessors(key);

        if let Some(idx) = self.nodes[update[0]].forward[0] {
            if self.nodes[idx].key == key {
                return Some(std::mem::replace(&mut self.nodes[idx].value, value));
            }
        }

        let height = self.generator.next_level(MAX_LEVEL).clamp(1, MAX_LEVEL);
        let node = Node {
            key,
            value,
            forward: [None; MAX_LEVEL],
        };
        let idx = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };

        for (lvl, &prev) in update.iter().enumerate().take(height) {
            self.nodes[idx].forward[lvl] = self.nodes[prev].forward[lvl];
            self.nodes[prev].forward[lvl] = Some(idx);
        }
        self.len += 1;
        None
    }

    /// Unlinks the node for `key` and returns its value.
    pub fn remove(&mut self, key: u64) -> Option<Value> {
        let update = self.predecessors(key);
        let idx = self.nodes[update[0]].forward[0]?;
        if self.nodes[idx].key != key {
            return None;
        }

        for (lvl, &prev) in update.iter().enumerate() {
            if self.nodes[prev].forward[lvl] != Some(idx) {
                break;
            }
            self.nodes[prev].forward[lvl] = self.nodes[idx].forward[lvl];
        }

        let node = &mut self.nodes[idx];
        node.forward = [None; MAX_LEVEL];
        let value = std::mem::replace(&mut node.value, Value::Tombstone);
        self.free.push(idx);
        self.len -= 1;
        Some(value)
    }

    /// Ascending walk over keys in `[start, end]`.
    pub fn range(&self, start: u64, end: u64) -> Iter<'_> {
        let next = if start > end {
            None
        } else {
            self.lower_bound(start)
        };
        Iter {
            list: self,
            next,
            end,
        }
    }

    /// Ascending walk over every entry.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            next: self.nodes[HEAD].forward[0],
            end: u64::MAX,
        }
    }

    /// Drops every node. The generator keeps its position.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.nodes.push(Self::head());
        self.free.clear();
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Highest level that currently links at least one node (0 when empty).
    pub fn height(&self) -> usize {
        self.nodes[HEAD]
            .forward
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |lvl| lvl + 1)
    }

    /// Number of nodes linked at `level` (0-based).
    pub fn level_len(&self, level: usize) -> usize {
        if level >= MAX_LEVEL {
            return 0;
        }
        let mut count = 0;
        let mut x = self.nodes[HEAD].forward[level];
        while let Some(idx) = x {
            count += 1;
            x = self.nodes[idx].forward[level];
        }
        count
    }
}

pub struct Iter<'a> {
    list: &'a SkipList,
    next: Option<usize>,
    end: u64,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (u64, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.next?;
        let node = &self.list.nodes[idx];
        if node.key > self.end {
            self.next = None;
            return None;
        }
        self.next = node.forward[0];
        Some((node.key, &node.value))
    }
}
