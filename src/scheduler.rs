// scheduler.rs - Display refresh to simulation frame decisions
//
// Wall-clock bookkeeping for the render loop. Every refresh is either an
// "important" frame (full simulation cycle, then display) or a cheap one
// (display only if partial frames are enabled, otherwise nothing).
// All times are milliseconds from the host's animation clock.

use crate::config::{
    FRAMES_PER_IMPORTANT_FRAME, MIN_IMPORTANT_FRAME_GAP_MS, RENDER_PARTIAL_FRAMES,
    SIM_SPEED_MULTIPLIER,
};

/// What one refresh should do
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    /// Run a full simulation cycle
    pub important: bool,
    /// Speed-scaled simulation timestep, seconds
    pub sim_delta: f32,
    /// Simulation clock, seconds
    pub sim_time: f32,
    /// Display lookahead for this frame, or `None` to skip drawing
    pub display: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct FrameScheduler {
    focused: bool,
    first_render_done: bool,
    busy: bool,

    // Clock
    time_prev: f64,
    time_prev_important: f64,
    sim_time_ms: f64,
    last_delta: f64,
    frame_parity: i32,
}

impl FrameScheduler {
    pub fn new(now_ms: f64) -> Self {
        Self {
            focused: true,
            first_render_done: false,
            busy: false,
            time_prev: now_ms,
            time_prev_important: now_ms,
            sim_time_ms: -1.0,
            last_delta: 0.0,
            frame_parity: 0,
        }
    }

    pub fn is_focused(&self) -> bool { self.focused }
    pub fn is_busy(&self) -> bool { self.busy }
    /// Simulation clock in milliseconds
    pub fn sim_time_ms(&self) -> f64 { self.sim_time_ms }
    /// Wall-clock length of the most recent refresh interval
    pub fn last_delta(&self) -> f64 { self.last_delta }

    /// Claim the tick. Returns false if a tick is already in progress.
    pub fn try_enter(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    pub fn leave(&mut self) {
        self.busy = false;
    }

    /// Advance the clock to `now_ms` and decide what this refresh does.
    /// `force_important` is set while the simulation still has to seed itself.
    pub fn advance(&mut self, now_ms: f64, force_important: bool) -> FramePlan {
        let delta = now_ms - self.time_prev;
        self.sim_time_ms += delta;
        self.time_prev = now_ms;
        self.last_delta = delta;
        let since_important = now_ms - self.time_prev_important;

        self.frame_parity -= 1;
        let important = self.frame_parity <= 0
            || !self.first_render_done
            || force_important
            || since_important > MIN_IMPORTANT_FRAME_GAP_MS;
        if important {
            self.frame_parity = FRAMES_PER_IMPORTANT_FRAME as i32;
            self.time_prev_important = now_ms;
            self.first_render_done = true;
        }

        let interval = FRAMES_PER_IMPORTANT_FRAME.max(1) as f64;
        let sim_delta = (since_important / 1000.0 * interval) as f32 * SIM_SPEED_MULTIPLIER;

        let display = if important {
            Some(0.0)
        } else if RENDER_PARTIAL_FRAMES {
            Some(sim_delta)
        } else {
            None
        };

        FramePlan {
            important,
            sim_delta,
            sim_time: (self.sim_time_ms / 1000.0) as f32,
            display,
        }
    }

    /// Resume after a blur. The clock restarts one refresh interval before
    /// `now_ms` so the first frame back sees an ordinary delta. Returns
    /// false if already focused.
    pub fn focus(&mut self, now_ms: f64) -> bool {
        if self.focused {
            return false;
        }
        self.time_prev = now_ms - self.last_delta;
        self.time_prev_important = self.time_prev;
        self.focused = true;
        log::debug!("focused at {now_ms:.1}ms");
        true
    }

    pub fn blur(&mut self) {
        self.focused = false;
        log::debug!("unfocused");
    }
}
