// sim/ - Multi-pass fluid solve
//
// One cycle is K full-screen passes through the texture ring. Each pass
// rebinds the framebuffer and sampler units, runs the simulation fragment
// for that step's stage set, and swaps whatever it wrote.

mod shader;
mod stage;

pub use shader::{SimUniforms, ambient_noise, initial_density, simulate};
pub use stage::{DensityStage, Schedule, StageCounts, StageSet, VelocityStage};

use crate::config::POINTER_SEGMENTS;
use crate::error::Result;
use crate::pointer::Segment;
use crate::texture::{Field, SamplerBindings, TextureRing};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    /// Next cycle seeds the fields and stops after one pass
    Initializing,
    Running,
}

/// Inputs shared by every pass of one cycle
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs {
    /// Canvas CSS width / height
    pub aspect: f32,
    /// Speed-scaled timestep in seconds
    pub delta_time: f32,
    /// Simulation clock in seconds
    pub time: f32,
    pub pointer: [Segment; POINTER_SEGMENTS],
}

impl Default for FrameInputs {
    fn default() -> Self {
        Self {
            aspect: 1.0,
            delta_time: 0.0,
            time: 0.0,
            pointer: [Segment::ZERO; POINTER_SEGMENTS],
        }
    }
}

/// Drives the per-step stage schedule through a texture ring
#[derive(Debug, Clone)]
pub struct PassSequencer {
    schedule: Schedule,
    state: SequencerState,
}

impl Default for PassSequencer {
    fn default() -> Self {
        Self::new(Schedule::default())
    }
}

impl PassSequencer {
    pub fn new(schedule: Schedule) -> Self {
        Self { schedule, state: SequencerState::Initializing }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn is_initializing(&self) -> bool {
        self.state == SequencerState::Initializing
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Force the next cycle to re-seed the fields (after any reallocation)
    pub fn reset(&mut self) {
        self.state = SequencerState::Initializing;
    }

    /// Run one cycle. Returns the number of passes issued.
    pub fn run_cycle(&mut self, ring: &mut TextureRing, inputs: &FrameInputs) -> Result<usize> {
        let initialize = self.is_initializing();
        let mut passes = 0;

        for (i, stages) in self.schedule.iter().enumerate() {
            let first = i == 0;
            bind_pass(ring, first);

            let uniforms = SimUniforms {
                tex_width: ring.width(),
                tex_height: ring.height(),
                aspect: inputs.aspect,
                delta_time: inputs.delta_time,
                time: inputs.time,
                stages,
                initialize,
                pointer: inputs.pointer,
            };
            ring.draw(&sampler_bindings(first), |uv, s| simulate(uv, &uniforms, s))?;
            ring.swap_attached();
            passes += 1;

            if initialize {
                break;
            }
        }

        self.state = SequencerState::Running;
        log::debug!(
            "simulation cycle: {passes} pass(es), dt {:.4}s, t {:.3}s{}",
            inputs.delta_time,
            inputs.time,
            if initialize { " (initializing)" } else { "" }
        );
        Ok(passes)
    }
}

/// Attach every field's next grid; density-temp only on the first step
fn bind_pass(ring: &mut TextureRing, first: bool) {
    let fb = ring.framebuffer_mut();
    for field in [
        Field::VelocityX,
        Field::VelocityY,
        Field::VelocityTempX,
        Field::VelocityTempY,
        Field::Density,
    ] {
        fb.attach(field.slot(), Some(field));
    }
    fb.attach(Field::DensityTemp.slot(), first.then_some(Field::DensityTemp));
}

/// Each unit reads its own field; density-temp has no value before step 1
fn sampler_bindings(first: bool) -> SamplerBindings {
    let mut bindings = SamplerBindings::default();
    for field in Field::ALL {
        bindings.bind(field, Some(field));
    }
    if first {
        bindings.bind(Field::DensityTemp, None);
    }
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{D_BOUND, Range};
    use crate::texture::texel_center;

    fn ring(w: u32, h: u32) -> TextureRing {
        let mut r = TextureRing::new();
        r.allocate(w, h).unwrap();
        r
    }

    #[test]
    fn initializing_cycle_is_a_single_pass() {
        let mut ring = ring(16, 16);
        let mut seq = PassSequencer::default();
        assert!(seq.is_initializing());
        assert_eq!(seq.run_cycle(&mut ring, &FrameInputs::default()).unwrap(), 1);
        assert_eq!(seq.state(), SequencerState::Running);
        assert_eq!(seq.run_cycle(&mut ring, &FrameInputs::default()).unwrap(), 14);
    }

    #[test]
    fn initializing_seeds_density_from_noise() {
        let mut ring = ring(16, 8);
        let mut seq = PassSequencer::default();
        let inputs = FrameInputs { aspect: 2.0, ..Default::default() };
        seq.run_cycle(&mut ring, &inputs).unwrap();

        let d = ring.previous(Field::Density);
        for y in 0..8 {
            for x in 0..16 {
                let uv = texel_center(x, y, 16, 8);
                let expected = initial_density(ambient_noise(uv, 2.0, 0.0));
                let got = d.value(x as i32, y as i32, Range::Density);
                assert!((got - expected).abs() <= 1e-5);
                assert!((0.0..=D_BOUND).contains(&got));
                assert_eq!(ring.previous(Field::VelocityX).value(x as i32, y as i32, Range::Velocity), 0.0);
                assert_eq!(ring.previous(Field::VelocityY).value(x as i32, y as i32, Range::Velocity), 0.0);
            }
        }
    }

    #[test]
    fn density_temp_swaps_only_on_the_first_step() {
        let mut ring = ring(8, 8);
        let mut seq = PassSequencer::default();
        seq.run_cycle(&mut ring, &FrameInputs::default()).unwrap();
        let before = ring.previous_index(Field::DensityTemp);
        let vx_before = ring.previous_index(Field::VelocityX);

        seq.run_cycle(&mut ring, &FrameInputs::default()).unwrap();
        // one swap for density-temp, fourteen (even) for the rest
        assert_eq!(ring.previous_index(Field::DensityTemp), before ^ 1);
        assert_eq!(ring.previous_index(Field::VelocityX), vx_before);
    }

    #[test]
    fn density_temp_holds_the_post_input_density() {
        let mut ring = ring(8, 8);
        let mut seq = PassSequencer::default();
        let inputs = FrameInputs { delta_time: 0.05, time: 1.0, ..Default::default() };
        seq.run_cycle(&mut ring, &inputs).unwrap();
        let seeded = ring.previous(Field::Density).clone();

        seq.run_cycle(&mut ring, &inputs).unwrap();
        let temp = ring.previous(Field::DensityTemp);
        for y in 0..8 {
            for x in 0..8 {
                let uv = texel_center(x, y, 8, 8);
                let noise = ambient_noise(uv, 1.0, 1.0);
                let expected = seeded.value(x as i32, y as i32, Range::Density) + noise * 0.4 * 0.05;
                assert!((temp.value(x as i32, y as i32, Range::Density) - expected).abs() <= 1e-4);
            }
        }
    }

    #[test]
    fn reset_returns_to_initializing() {
        let mut ring = ring(8, 8);
        let mut seq = PassSequencer::default();
        seq.run_cycle(&mut ring, &FrameInputs::default()).unwrap();
        seq.reset();
        assert!(seq.is_initializing());
        assert_eq!(seq.run_cycle(&mut ring, &FrameInputs::default()).unwrap(), 1);
    }

    #[test]
    fn unallocated_ring_is_an_error() {
        let mut ring = TextureRing::new();
        let mut seq = PassSequencer::default();
        assert!(seq.run_cycle(&mut ring, &FrameInputs::default()).is_err());
        assert!(seq.is_initializing());
    }

    #[test]
    fn bindings_leave_density_temp_alone_after_step_one() {
        let mut ring = ring(4, 4);
        bind_pass(&mut ring, false);
        assert_eq!(ring.framebuffer().attachment(Field::DensityTemp.slot()), None);
        assert_eq!(ring.framebuffer().attached().count(), 5);
        bind_pass(&mut ring, true);
        assert_eq!(ring.framebuffer().attached().count(), 6);

        assert_eq!(sampler_bindings(true).bound(Field::DensityTemp), None);
        assert_eq!(sampler_bindings(false).bound(Field::DensityTemp), Some(Field::DensityTemp));
    }
}
