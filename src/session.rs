// session.rs - One running fluid backdrop
//
// Owns every piece of mutable state: grids, sequencer, clock, pointer
// history and the display buffer. The host calls `tick` once per display
// refresh and stops calling it once `tick` reports the session paused.

use glam::Vec2;

use crate::config::simulation_size;
use crate::error::Result;
use crate::pointer::{self, PointerHistory};
use crate::render::DisplayPass;
use crate::scheduler::{FramePlan, FrameScheduler};
use crate::sim::{FrameInputs, PassSequencer};
use crate::texture::TextureRing;

/// Outcome of one `tick`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Unfocused; request no further frames
    Paused,
    /// Another tick was still running
    Busy,
    /// The tick failed and the frame was dropped
    Forfeited,
    /// Clock advanced, nothing new to show
    Idle,
    /// The display buffer holds a new frame
    Rendered,
}

impl Tick {
    pub fn keep_running(self) -> bool {
        self != Tick::Paused
    }

    pub fn rendered(self) -> bool {
        self == Tick::Rendered
    }
}

pub struct RenderSession {
    css_w: f32,
    css_h: f32,

    ring: TextureRing,
    sequencer: PassSequencer,
    scheduler: FrameScheduler,
    display: DisplayPass,

    // Latest pointer position (sticky) and the per-frame history
    pointer: Option<Vec2>,
    history: PointerHistory,
}

impl RenderSession {
    /// Allocate grids for a canvas of `css_w` x `css_h` CSS pixels. The
    /// first tick seeds the fields.
    pub fn new(css_w: f32, css_h: f32, now_ms: f64) -> Result<Self> {
        let (w, h) = simulation_size(css_w, css_h);
        let mut ring = TextureRing::new();
        ring.allocate(w, h)?;
        log::info!("fluid session started ({css_w}x{css_h} css, {w}x{h} sim)");

        Ok(Self {
            css_w,
            css_h,
            ring,
            sequencer: PassSequencer::default(),
            scheduler: FrameScheduler::new(now_ms),
            display: DisplayPass::new(w, h),
            pointer: None,
            history: PointerHistory::new(),
        })
    }

    /// Track a new canvas size. Grids are rebuilt (and re-seeded) only when
    /// the simulation resolution changes. Returns whether that happened.
    pub fn resize(&mut self, css_w: f32, css_h: f32) -> Result<bool> {
        self.css_w = css_w;
        self.css_h = css_h;

        let (w, h) = simulation_size(css_w, css_h);
        if (w, h) == (self.ring.width(), self.ring.height()) {
            return Ok(false);
        }
        log::debug!(
            "resizing simulation from {}x{} to {w}x{h}",
            self.ring.width(),
            self.ring.height()
        );
        self.ring.allocate(w, h)?;
        self.sequencer.reset();
        self.display.resize(w, h);
        Ok(true)
    }

    /// Pointer at canvas-relative CSS pixel (`x`, `y`)
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if self.css_w > 0.0 && self.css_h > 0.0 {
            self.pointer = Some(pointer::normalize(x, y, self.css_w, self.css_h));
        }
    }

    pub fn pointer_leave(&mut self) {
        self.pointer = None;
    }

    /// Run one display refresh at `now_ms`
    pub fn tick(&mut self, now_ms: f64) -> Tick {
        if !self.scheduler.is_focused() {
            return Tick::Paused;
        }
        if !self.scheduler.try_enter() {
            return Tick::Busy;
        }
        let result = self.step(now_ms);
        self.scheduler.leave();

        match result {
            Ok(plan) if plan.display.is_some() => Tick::Rendered,
            Ok(_) => Tick::Idle,
            Err(e) => {
                log::error!("fluid tick failed: {e}");
                Tick::Forfeited
            }
        }
    }

    fn step(&mut self, now_ms: f64) -> Result<FramePlan> {
        let plan = self.scheduler.advance(now_ms, self.sequencer.is_initializing());

        if plan.important {
            if let Some(p) = self.pointer {
                self.history.push(p);
            }
            let inputs = FrameInputs {
                aspect: self.aspect(),
                delta_time: plan.sim_delta,
                time: plan.sim_time,
                pointer: self.history.segments(),
            };
            self.sequencer.run_cycle(&mut self.ring, &inputs)?;
            self.history.clear();
        }

        // Seed the history for the next important frame
        match self.pointer {
            Some(p) => self.history.push(p),
            None => self.history.clear(),
        }

        if let Some(delta) = plan.display {
            let aspect = self.aspect();
            self.display.render(&self.ring, aspect, delta);
        }
        Ok(plan)
    }

    /// Resume after a blur. Returns true if the host should restart its
    /// frame loop.
    pub fn focus(&mut self, now_ms: f64) -> bool {
        if !self.scheduler.focus(now_ms) {
            return false;
        }
        // Don't drag from wherever the pointer was long ago
        self.history.clear();
        true
    }

    pub fn blur(&mut self) {
        self.scheduler.blur();
    }

    /// Rebuild the grids at the current size and start over
    pub fn reset(&mut self) -> Result<()> {
        let (w, h) = (self.ring.width(), self.ring.height());
        let (w, h) = if w == 0 || h == 0 { simulation_size(self.css_w, self.css_h) } else { (w, h) };
        self.ring.allocate(w, h)?;
        self.sequencer.reset();
        self.history.clear();
        self.display.resize(w, h);
        self.display.clear();
        log::info!("fluid session reset");
        Ok(())
    }

    pub fn dispose(mut self) {
        self.ring.release();
        log::info!("fluid session disposed");
    }

    /// Canvas CSS width / height
    pub fn aspect(&self) -> f32 {
        if self.css_h > 0.0 && self.css_w > 0.0 { self.css_w / self.css_h } else { 1.0 }
    }

    pub fn is_initializing(&self) -> bool { self.sequencer.is_initializing() }
    pub fn is_focused(&self) -> bool { self.scheduler.is_focused() }
    pub fn ring(&self) -> &TextureRing { &self.ring }
    pub fn scheduler(&self) -> &FrameScheduler { &self.scheduler }
    pub fn display(&self) -> &DisplayPass { &self.display }
    pub fn display_mut(&mut self) -> &mut DisplayPass { &mut self.display }
    pub fn pointer_history(&self) -> &PointerHistory { &self.history }

    // Accessors for the canvas
    pub fn output_ptr(&self) -> *const u8 { self.display.ptr() }
    pub fn output_len(&self) -> usize { self.display.len() }
    pub fn pixels(&self) -> &[u8] { self.display.pixels() }
    pub fn width(&self) -> u32 { self.display.width() }
    pub fn height(&self) -> u32 { self.display.height() }
    pub fn sim_width(&self) -> u32 { self.ring.width() }
    pub fn sim_height(&self) -> u32 { self.ring.height() }
}
