// config.rs - Build-time tuning
//
// Everything here is fixed at compile time. Physical constants that only
// the shaders care about live next to the shader that uses them.

/// Simulation texels per CSS pixel of the canvas
pub const CANVAS_SCALE: f32 = 1.0 / 3.0;
pub const SIM_SIZE_MIN: u32 = 128;
pub const SIM_SIZE_MAX: u32 = 1024;

/// A full simulation cycle runs on every Nth display frame
pub const FRAMES_PER_IMPORTANT_FRAME: u32 = 2;
/// Redraw on in-between frames with a forward-looking display sample
pub const RENDER_PARTIAL_FRAMES: bool = false;
/// Force an important frame when this much wall-clock time has passed
pub const MIN_IMPORTANT_FRAME_GAP_MS: f64 = 1000.0 / 25.0;
pub const SIM_SPEED_MULTIPLIER: f32 = 1.6;

// Iterations per stage of one simulation cycle
pub const INPUT_ITERATIONS: usize = 1;
pub const VELOCITY_DIFFUSE_ITERATIONS: usize = 2;
pub const PROJECT_RELAX_ITERATIONS: usize = 3;

pub const POINTER_HISTORY_CAPACITY: usize = FRAMES_PER_IMPORTANT_FRAME as usize + 1;
pub const POINTER_SEGMENTS: usize = POINTER_HISTORY_CAPACITY - 1;

/// Simulation grid size for a canvas of the given CSS size.
///
/// Each axis is scaled, rounded to the nearest power of two and clamped
/// to [SIM_SIZE_MIN, SIM_SIZE_MAX].
pub fn simulation_size(css_width: f32, css_height: f32) -> (u32, u32) {
    (simulation_axis(css_width), simulation_axis(css_height))
}

fn simulation_axis(css: f32) -> u32 {
    let scaled = (css * CANVAS_SCALE).ceil();
    if !scaled.is_finite() || scaled < 1.0 {
        return SIM_SIZE_MIN;
    }
    let n = scaled.min(u32::MAX as f32 / 2.0) as u32;
    nearest_power_of_two(n).clamp(SIM_SIZE_MIN, SIM_SIZE_MAX)
}

/// Nearest power of two, ties rounding up. Zero maps to one.
pub fn nearest_power_of_two(n: u32) -> u32 {
    if n <= 1 {
        return 1;
    }
    if n.is_power_of_two() {
        return n;
    }
    let up = n.next_power_of_two();
    let down = up >> 1;
    if up - n <= n - down { up } else { down }
}
