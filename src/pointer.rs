// pointer.rs - Recent pointer positions as force segments
//
// Positions are normalized canvas coordinates ([0,1]^2, origin bottom-left).
// One position is pushed per display frame; each important frame turns the
// history into directed segments for the input stage and then clears it.

use glam::Vec2;

use crate::config::{POINTER_HISTORY_CAPACITY, POINTER_SEGMENTS};

/// One pointer stroke: from `start` along unit `dir` for `magnitude`.
/// A zero segment exerts no force.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Segment {
    pub start: Vec2,
    pub dir: Vec2,
    pub magnitude: f32,
}

impl Segment {
    pub const ZERO: Segment = Segment { start: Vec2::ZERO, dir: Vec2::ZERO, magnitude: 0.0 };

    /// Segment from `older` to `newer`. Coincident points give a zero
    /// direction and zero magnitude.
    pub fn between(older: Vec2, newer: Vec2) -> Self {
        let d = newer - older;
        let magnitude = d.length();
        let dir = if magnitude > 0.0 { d / magnitude } else { Vec2::ZERO };
        Self { start: older, dir, magnitude }
    }

    pub fn end(&self) -> Vec2 {
        self.start + self.dir * self.magnitude
    }
}

/// Fixed-capacity ring of recent positions
#[derive(Debug, Clone)]
pub struct PointerHistory {
    slots: [Vec2; POINTER_HISTORY_CAPACITY],
    top: usize,
    len: usize,
}

impl Default for PointerHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerHistory {
    pub fn new() -> Self {
        Self { slots: [Vec2::ZERO; POINTER_HISTORY_CAPACITY], top: 0, len: 0 }
    }

    /// Overwrite the oldest slot and advance the write cursor
    pub fn push(&mut self, pos: Vec2) {
        self.slots[self.top] = pos;
        self.top = (self.top + 1) % POINTER_HISTORY_CAPACITY;
        self.len = (self.len + 1).min(POINTER_HISTORY_CAPACITY);
    }

    /// Forget all positions (slot contents are left as-is)
    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `age` 0 is the newest position. Ages past the oldest stored position
    /// repeat the oldest one.
    fn at_age(&self, age: usize) -> Vec2 {
        let age = age.min(self.len - 1);
        let idx = (self.top + POINTER_HISTORY_CAPACITY - 1 - age) % POINTER_HISTORY_CAPACITY;
        self.slots[idx]
    }

    /// Consecutive positions paired into segments, newest first.
    /// An empty history yields only zero segments.
    pub fn segments(&self) -> [Segment; POINTER_SEGMENTS] {
        if self.is_empty() {
            return [Segment::ZERO; POINTER_SEGMENTS];
        }
        std::array::from_fn(|i| Segment::between(self.at_age(i + 1), self.at_age(i)))
    }
}

/// Canvas-relative CSS pixel position to normalized, y-up coordinates
pub fn normalize(x: f32, y: f32, css_width: f32, css_height: f32) -> Vec2 {
    Vec2::new(x / css_width, 1.0 - y / css_height)
}
