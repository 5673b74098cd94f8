use wasm_bindgen::prelude::*;

// ============================================================================
// FLUID WORLD - Animated fluid backdrop (density + velocity, multi-pass solve)
// ============================================================================

pub mod codec;
pub mod config;
pub mod error;
pub mod noise;
pub mod pointer;
pub mod render;
pub mod scheduler;
pub mod session;
pub mod sim;
pub mod texture;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use error::{FluidError, Result};
pub use session::{RenderSession, Tick};

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsError::new(&err.to_string()).into()
}

/// Fluid backdrop driven from JavaScript. The host owns the canvas and the
/// animation loop; this owns everything else.
#[wasm_bindgen]
pub struct FluidWorld {
    session: RenderSession,
    rendered: bool,
}

#[wasm_bindgen]
impl FluidWorld {
    #[wasm_bindgen(constructor)]
    pub fn new(css_w: f32, css_h: f32, now_ms: f64) -> Result<FluidWorld, JsValue> {
        let session = RenderSession::new(css_w, css_h, now_ms).map_err(js_error)?;
        Ok(Self { session, rendered: false })
    }

    /// Advance to `now_ms`. Returns false once the loop should stop.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        let tick = self.session.tick(now_ms);
        self.rendered = tick.rendered();
        tick.keep_running()
    }

    /// Whether the last tick produced a new frame
    pub fn rendered(&self) -> bool {
        self.rendered
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.session.pointer_move(x, y);
    }

    pub fn pointer_leave(&mut self) {
        self.session.pointer_leave();
    }

    /// Returns true if the host should restart its animation loop
    pub fn focus(&mut self, now_ms: f64) -> bool {
        self.session.focus(now_ms)
    }

    pub fn blur(&mut self) {
        self.session.blur();
    }

    /// Returns true if the output size changed
    pub fn resize(&mut self, css_w: f32, css_h: f32) -> Result<bool, JsValue> {
        self.session.resize(css_w, css_h).map_err(js_error)
    }

    pub fn reset(&mut self) -> Result<(), JsValue> {
        self.session.reset().map_err(js_error)
    }

    // Accessors for WASM
    pub fn output_ptr(&self) -> *const u8 { self.session.output_ptr() }
    pub fn output_len(&self) -> usize { self.session.output_len() }
    pub fn width(&self) -> u32 { self.session.width() }
    pub fn height(&self) -> u32 { self.session.height() }
    pub fn sim_width(&self) -> u32 { self.session.sim_width() }
    pub fn sim_height(&self) -> u32 { self.session.sim_height() }

    /// Copy of the current frame, ready for `new ImageData(frame, w, h)`
    pub fn frame(&self) -> js_sys::Uint8ClampedArray {
        js_sys::Uint8ClampedArray::from(self.session.pixels())
    }
}
