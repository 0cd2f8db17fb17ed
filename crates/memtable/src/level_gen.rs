//! Deterministic level assignment for skip list nodes.

/// Chooses the height of a newly inserted skip list node.
///
/// Implementations must return a value in `1..=max_level`.
pub trait LevelGenerator: Send {
    fn next_level(&mut self, max_level: usize) -> usize;
}

const LCG_MODULUS: u64 = 2_147_483_647;
const LCG_MULTIPLIER: u64 = 16_807;

/// Park-Miller minimal standard generator (`s = 16807 * s mod 2^31-1`).
///
/// Each level is granted with probability 1/2 until a draw fails or the cap
/// is reached. The same seed always produces the same sequence of heights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    /// Creates a generator from `seed`. A seed that is `0 mod 2^31-1` would
    /// lock the sequence at zero, so it is replaced by 1.
    pub fn new(seed: u64) -> Self {
        let state = seed % LCG_MODULUS;
        Self {
            state: if state == 0 { 1 } else { state },
        }
    }

    /// Advances the generator and returns a draw in `(0, 1)`.
    pub fn next_unit(&mut self) -> f64 {
        self.state = (LCG_MULTIPLIER * self.state) % LCG_MODULUS;
        self.state as f64 / LCG_MODULUS as f64
    }
}

impl Default for Lcg {
    fn default() -> Self {
        Self::new(1)
    }
}

impl LevelGenerator for Lcg {
    fn next_level(&mut self, max_level: usize) -> usize {
        let mut level = 1;
        while level < max_level && self.next_unit() < 0.5 {
            level += 1;
        }
        level
    }
}
