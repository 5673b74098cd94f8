// shader.rs - Per-texel fluid physics
//
// The simulation fragment function. It is invoked once per texel for every
// pass and only ever looks at field values, never at neighbouring texels'
// stages, so a pass is embarrassingly parallel. Diffusion is one implicit
// relaxation step, projection is a Jacobi-style solve spread across passes,
// advection is a semi-Lagrangian back-trace through bilinear sampling.

use std::f32::consts::TAU;

use glam::{Vec2, Vec3};

use super::stage::{DensityStage, StageSet, VelocityStage};
use crate::codec::{Range, encode};
use crate::config::POINTER_SEGMENTS;
use crate::noise::simplex3;
use crate::pointer::Segment;
use crate::texture::{COLOR_ATTACHMENTS, Field, FragmentOutputs, Samplers};

// Initial state
const INIT_VELOCITY: Vec2 = Vec2::ZERO;
pub const INIT_DENSITY_SCALE: f32 = 10.0;

// Sources and diffusion
const DENSITY_DIFFUSION: f32 = 1.25;
const VELOCITY_DIFFUSION: f32 = 1.75;
const DENSITY_NOISE_SOURCE: f32 = 0.4;
const VELOCITY_NOISE_SOURCE: f32 = 0.000_000_75;
const NOISE_ANGLE_OFFSET: f32 = 1.827_384;

// Pointer influence
pub const POINTER_MAX_DIST: f32 = 0.015;
const POINTER_AWAY_AMOUNT: f32 = 0.8;
const POINTER_STRENGTH: f32 = 0.7;
// High, or the hollow low-precision core of the falloff becomes visible
const POINTER_FALLOFF_EXP: f32 = 8.5;
const ROUNDED_SEGMENT_START: bool = false;
const ROUNDED_SEGMENT_END: bool = true;

// Ambient noise
const NOISE_SCALE: f32 = 3.6;
const NOISE_CHANGE_SPEED: f32 = 0.05;

// Projection gains
const PROJECT_GRADIENT_GAIN: f32 = 50_000.0;
const PROJECT_RELAX_WEIGHT: f32 = 0.25;
const PROJECT_APPLY_GAIN: f32 = 0.000_005;

/// Per-pass uniform block
#[derive(Debug, Clone, Copy)]
pub struct SimUniforms {
    pub tex_width: u32,
    pub tex_height: u32,
    /// Canvas width / height
    pub aspect: f32,
    /// Speed-scaled timestep, seconds
    pub delta_time: f32,
    /// Total simulation time, seconds
    pub time: f32,
    pub stages: StageSet,
    pub initialize: bool,
    pub pointer: [Segment; POINTER_SEGMENTS],
}

impl SimUniforms {
    /// Neighbour offsets in uv space (horizontal spacing carries the aspect)
    #[inline]
    fn cell(&self) -> Vec2 {
        Vec2::new(self.aspect / self.tex_width as f32, 1.0 / self.tex_height as f32)
    }
}

/// Ambient noise value at `uv` for time `time`
#[inline]
pub fn ambient_noise(uv: Vec2, aspect: f32, time: f32) -> f32 {
    let pos = Vec3::new(uv.x * aspect, uv.y, 0.0) * NOISE_SCALE
        + Vec3::new(0.0, 0.0, time * NOISE_CHANGE_SPEED);
    simplex3(pos)
}

/// Density written by the initializing pass for a given noise value
#[inline]
pub fn initial_density(noise: f32) -> f32 {
    (noise * 0.5 + 0.5) * INIT_DENSITY_SCALE
}

#[inline]
fn velocity_at(s: &Samplers<'_>, uv: Vec2) -> Vec2 {
    Vec2::new(
        s.sample(Field::VelocityX, uv, Range::Velocity),
        s.sample(Field::VelocityY, uv, Range::Velocity),
    )
}

/// The four axis neighbours of a texel: (-y, -x, +x, +y)
#[derive(Clone, Copy)]
struct Stencil {
    down: Vec2,
    left: Vec2,
    right: Vec2,
    up: Vec2,
}

impl Stencil {
    fn around(uv: Vec2, cell: Vec2) -> Self {
        Self {
            down: uv + Vec2::new(0.0, -cell.y),
            left: uv + Vec2::new(-cell.x, 0.0),
            right: uv + Vec2::new(cell.x, 0.0),
            up: uv + Vec2::new(0.0, cell.y),
        }
    }

    fn map<T>(&self, f: impl Fn(Vec2) -> T) -> [T; 4] {
        [f(self.down), f(self.left), f(self.right), f(self.up)]
    }
}

/// Pointer contribution to velocity at `uv`
fn pointer_force(uv: Vec2, u: &SimUniforms) -> Vec2 {
    let aspect = u.aspect;
    let mut prox = POINTER_MAX_DIST;
    let mut push_from = Vec2::ZERO;
    let mut mag = 0.0;
    let mut stroke = Vec2::ZERO;

    let mut consider = |dist: f32, disp: Vec2, seg: &Segment| {
        if dist < prox {
            prox = dist;
            push_from = disp;
            mag = seg.magnitude;
            stroke = seg.dir;
        }
    };

    for seg in &u.pointer {
        // Distance to the stroke body, measured along its normal
        let mut disp = uv - seg.start;
        disp.x /= aspect;
        let along = disp.dot(seg.dir);
        let dist = if along >= 0.0 && along < seg.magnitude {
            disp.dot(Vec2::new(seg.dir.y * aspect, -seg.dir.x)).abs()
        } else {
            POINTER_MAX_DIST
        };
        consider(dist, disp, seg);

        if ROUNDED_SEGMENT_START {
            let disp = uv - seg.start;
            consider(Vec2::new(disp.x * aspect, disp.y).length(), disp, seg);
        }
        if ROUNDED_SEGMENT_END {
            let disp = uv - seg.end();
            consider(Vec2::new(disp.x * aspect, disp.y).length(), disp, seg);
        }
    }

    // Right on the stroke there is no "away"; push sideways
    let push = if prox > 0.0 { push_from / prox } else { Vec2::X };

    let influence = (1.0 - prox / POINTER_MAX_DIST).max(0.0);
    let influence = influence.powf(POINTER_FALLOFF_EXP) * u.delta_time * mag * POINTER_STRENGTH;
    influence * (push * POINTER_AWAY_AMOUNT + stroke)
}

/// Simulation fragment: compute every attachment's output for the texel at `uv`
pub fn simulate(uv: Vec2, u: &SimUniforms, s: &Samplers<'_>) -> FragmentOutputs {
    let mut out: FragmentOutputs = [None; COLOR_ATTACHMENTS];
    let noise = ambient_noise(uv, u.aspect, u.time);

    if u.initialize {
        out[Field::VelocityX.slot()] = Some(encode(INIT_VELOCITY.x, Range::Velocity));
        out[Field::VelocityY.slot()] = Some(encode(INIT_VELOCITY.y, Range::Velocity));
        out[Field::Density.slot()] = Some(encode(initial_density(noise), Range::Density));
        return out;
    }

    let cell = u.cell();
    let n = Stencil::around(uv, cell);
    let dt = u.delta_time;

    // Velocity
    let mut v = velocity_at(s, uv);
    match u.stages.velocity() {
        Some(VelocityStage::Inputs) => {
            v += pointer_force(uv, u);

            // Very slight noise-driven swirl, offset so it isn't too regular
            let angle = noise * TAU + NOISE_ANGLE_OFFSET;
            v += Vec2::new(angle.sin(), angle.cos()) * VELOCITY_NOISE_SOURCE * dt;

            // Start-of-step velocity for the diffuse passes
            out[Field::VelocityTempX.slot()] = Some(encode(v.x, Range::Velocity));
            out[Field::VelocityTempY.slot()] = Some(encode(v.y, Range::Velocity));
        }
        Some(VelocityStage::Diffuse) => {
            let initial_x = s.texel(Field::VelocityTempX, uv);
            let initial_y = s.texel(Field::VelocityTempY, uv);
            let initial = Vec2::new(
                s.sample(Field::VelocityTempX, uv, Range::Velocity),
                s.sample(Field::VelocityTempY, uv, Range::Velocity),
            );
            let [a, b, c, d] = n.map(|p| velocity_at(s, p));
            let k = VELOCITY_DIFFUSION * dt;
            v = (initial + k * (a + b + c + d)) / (1.0 + 4.0 * k);

            out[Field::VelocityTempX.slot()] = Some(initial_x);
            out[Field::VelocityTempY.slot()] = Some(initial_y);
        }
        Some(VelocityStage::ProjectGradient) => {
            let [down, left, right, up] = n.map(|p| velocity_at(s, p));
            let g = encode(
                PROJECT_GRADIENT_GAIN * (right.x - left.x + up.y - down.y),
                Range::Projection,
            );
            // Seed the relaxation with the divergence itself
            out[Field::VelocityTempX.slot()] = Some(g);
            out[Field::VelocityTempY.slot()] = Some(g);
        }
        Some(VelocityStage::ProjectRelax) => {
            let g = s.texel(Field::VelocityTempX, uv);
            let divergence = s.sample(Field::VelocityTempX, uv, Range::Projection);
            let [a, b, c, d] = n.map(|p| s.sample(Field::VelocityTempY, p, Range::Projection));
            let p = (divergence + a + b + c + d) * PROJECT_RELAX_WEIGHT;

            out[Field::VelocityTempX.slot()] = Some(g);
            out[Field::VelocityTempY.slot()] = Some(encode(p, Range::Projection));
        }
        Some(VelocityStage::ProjectApply) => {
            let [down, left, right, up] =
                n.map(|p| s.sample(Field::VelocityTempY, p, Range::Projection));
            v += PROJECT_APPLY_GAIN * Vec2::new(right - left, up - down);
        }
        Some(VelocityStage::Advect) => {
            v = velocity_at(s, uv - v * dt / cell);
        }
        None => {}
    }
    out[Field::VelocityX.slot()] = Some(encode(v.x, Range::Velocity));
    out[Field::VelocityY.slot()] = Some(encode(v.y, Range::Velocity));

    // Density
    let mut d = s.sample(Field::Density, uv, Range::Density);
    match u.stages.density() {
        Some(DensityStage::Inputs) => {
            d += noise * DENSITY_NOISE_SOURCE * dt;
            // Start-of-step density for the diffuse passes
            out[Field::DensityTemp.slot()] = Some(encode(d, Range::Density));
        }
        Some(DensityStage::Diffuse) => {
            let [a, b, c, e] = n.map(|p| s.sample(Field::Density, p, Range::Density));
            let k = DENSITY_DIFFUSION * dt;
            let initial = s.sample(Field::DensityTemp, uv, Range::Density);
            d = (initial + k * (a + b + c + e)) / (1.0 + 4.0 * k);
        }
        Some(DensityStage::Advect) => {
            // Velocity here is final for the cycle, so tracing along it is safe
            d = s.sample(Field::Density, uv - v * dt / cell, Range::Density);
        }
        None => {}
    }
    out[Field::Density.slot()] = Some(encode(d, Range::Density));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;
    use crate::texture::{SamplerBindings, TextureRing, texel_center};

    fn uniforms(stages: StageSet) -> SimUniforms {
        SimUniforms {
            tex_width: 16,
            tex_height: 16,
            aspect: 1.0,
            delta_time: 0.1,
            time: 0.0,
            stages,
            initialize: false,
            pointer: [Segment::ZERO; POINTER_SEGMENTS],
        }
    }

    fn bindings() -> SamplerBindings {
        let mut b = SamplerBindings::default();
        for f in Field::ALL {
            b.bind(f, Some(f));
        }
        b
    }

    /// Run the fragment once at texel (x, y) of a ring whose previous-role
    /// grids were prepared by `setup`.
    fn shade_at(
        stages: StageSet,
        x: u32,
        y: u32,
        tweak: impl FnOnce(&mut SimUniforms),
        setup: impl FnOnce(&mut TextureRing),
    ) -> FragmentOutputs {
        let mut ring = TextureRing::new();
        ring.allocate(16, 16).unwrap();
        setup(&mut ring);
        let mut u = uniforms(stages);
        tweak(&mut u);
        let mut result = None;
        let target = texel_center(x, y, 16, 16);
        ring.draw(&bindings(), |uv, s| {
            let out = simulate(uv, &u, s);
            if uv == target {
                result = Some(out);
            }
            out
        })
        .unwrap();
        result.unwrap()
    }

    /// Fill previous-role grids through a single pass
    fn seed(ring: &mut TextureRing, f: impl Fn(Vec2) -> FragmentOutputs) {
        for field in Field::ALL {
            ring.framebuffer_mut().attach(field.slot(), Some(field));
        }
        ring.draw(&bindings(), |uv, _| f(uv)).unwrap();
        ring.swap_attached();
    }

    fn value(out: &FragmentOutputs, field: Field, range: Range) -> f32 {
        decode(out[field.slot()].unwrap(), range)
    }

    #[test]
    fn initializing_writes_zero_velocity_and_noise_density() {
        let out = shade_at(StageSet::EMPTY, 3, 5, |u| u.initialize = true, |_| {});
        assert_eq!(value(&out, Field::VelocityX, Range::Velocity), 0.0);
        assert_eq!(value(&out, Field::VelocityY, Range::Velocity), 0.0);
        let uv = texel_center(3, 5, 16, 16);
        let expected = initial_density(ambient_noise(uv, 1.0, 0.0));
        assert!((value(&out, Field::Density, Range::Density) - expected).abs() <= 1e-5);
        assert!(out[Field::VelocityTempX.slot()].is_none());
        assert!(out[Field::DensityTemp.slot()].is_none());
    }

    #[test]
    fn inputs_without_pointer_only_add_tiny_noise() {
        let out = shade_at(StageSet::INPUTS, 8, 8, |_| {}, |_| {});
        let vx = value(&out, Field::VelocityX, Range::Velocity);
        let vy = value(&out, Field::VelocityY, Range::Velocity);
        let bound = VELOCITY_NOISE_SOURCE * 0.1 * 1.0001;
        assert!(vx.abs() <= bound && vy.abs() <= bound);
        assert_eq!(out[Field::VelocityX.slot()], out[Field::VelocityTempX.slot()]);
        assert_eq!(out[Field::Density.slot()], out[Field::DensityTemp.slot()]);
    }

    #[test]
    fn pointer_stroke_drags_fluid_along() {
        let centre = texel_center(8, 8, 16, 16);
        let out = shade_at(
            StageSet::INPUTS,
            8,
            8,
            |u| {
                // stroke passing just under the texel centre, moving +x
                u.pointer[0] = Segment::between(
                    centre - Vec2::new(0.1, 0.001),
                    centre + Vec2::new(0.1, -0.001),
                );
            },
            |_| {},
        );
        let vx = value(&out, Field::VelocityX, Range::Velocity);
        assert!(vx > VELOCITY_NOISE_SOURCE, "vx = {vx}");
    }

    #[test]
    fn far_pointer_strokes_have_no_effect() {
        let far = Segment::between(Vec2::new(0.9, 0.9), Vec2::new(0.95, 0.9));
        let with = shade_at(StageSet::INPUTS, 2, 2, |u| u.pointer[0] = far, |_| {});
        let without = shade_at(StageSet::INPUTS, 2, 2, |_| {}, |_| {});
        assert_eq!(with, without);
    }

    #[test]
    fn pointer_on_the_stroke_is_finite() {
        let uv = texel_center(4, 4, 16, 16);
        let mut u = uniforms(StageSet::INPUTS);
        u.pointer[0] = Segment::between(uv - Vec2::new(0.05, 0.0), uv);
        let f = pointer_force(uv, &u);
        assert!(f.is_finite());
    }

    #[test]
    fn density_diffusion_preserves_uniform_fields() {
        let out = shade_at(StageSet::D_DIFFUSE | StageSet::V_DIFFUSE, 5, 5, |_| {}, |ring| {
            seed(ring, |_| {
                let mut o = [None; COLOR_ATTACHMENTS];
                o[Field::Density.slot()] = Some(encode(7.0, Range::Density));
                o[Field::DensityTemp.slot()] = Some(encode(7.0, Range::Density));
                o[Field::VelocityX.slot()] = Some(encode(0.0004, Range::Velocity));
                o[Field::VelocityTempX.slot()] = Some(encode(0.0004, Range::Velocity));
                o[Field::VelocityY.slot()] = Some(encode(0.0, Range::Velocity));
                o[Field::VelocityTempY.slot()] = Some(encode(0.0, Range::Velocity));
                o
            });
        });
        assert!((value(&out, Field::Density, Range::Density) - 7.0).abs() <= 1e-4);
        assert!((value(&out, Field::VelocityX, Range::Velocity) - 0.0004).abs() <= 1e-9);
    }

    #[test]
    fn density_diffusion_relaxes_a_spike() {
        let out = shade_at(StageSet::D_DIFFUSE | StageSet::V_DIFFUSE, 5, 5, |_| {}, |ring| {
            seed(ring, |uv| {
                let spike = uv == texel_center(5, 5, 16, 16);
                let d = if spike { 50.0 } else { 0.0 };
                let mut o = [None; COLOR_ATTACHMENTS];
                o[Field::Density.slot()] = Some(encode(d, Range::Density));
                o[Field::DensityTemp.slot()] = Some(encode(d, Range::Density));
                o
            });
        });
        let k = DENSITY_DIFFUSION * 0.1;
        assert!((value(&out, Field::Density, Range::Density) - (50.0 / (1.0 + 4.0 * k))).abs() <= 1e-3);
    }

    #[test]
    fn divergence_free_field_has_zero_gradient() {
        let out = shade_at(StageSet::V_PROJECT_GRADIENT | StageSet::D_DIFFUSE, 7, 7, |_| {}, |ring| {
            seed(ring, |_| {
                let mut o = [None; COLOR_ATTACHMENTS];
                o[Field::VelocityX.slot()] = Some(encode(0.0003, Range::Velocity));
                o[Field::VelocityY.slot()] = Some(encode(-0.0002, Range::Velocity));
                o
            });
        });
        assert_eq!(value(&out, Field::VelocityTempX, Range::Projection), 0.0);
        assert_eq!(out[Field::VelocityTempX.slot()], out[Field::VelocityTempY.slot()]);
    }

    #[test]
    fn relax_averages_divergence_with_neighbours() {
        let out = shade_at(StageSet::V_PROJECT_RELAX | StageSet::D_DIFFUSE, 7, 7, |_| {}, |ring| {
            seed(ring, |_| {
                let mut o = [None; COLOR_ATTACHMENTS];
                o[Field::VelocityTempX.slot()] = Some(encode(2.0, Range::Projection));
                o[Field::VelocityTempY.slot()] = Some(encode(1.0, Range::Projection));
                o
            });
        });
        // (2 + 4 * 1) * 0.25
        assert!((value(&out, Field::VelocityTempY, Range::Projection) - 1.5).abs() <= 1e-5);
        assert!((value(&out, Field::VelocityTempX, Range::Projection) - 2.0).abs() <= 1e-5);
    }

    #[test]
    fn advection_of_still_fluid_is_identity() {
        let out = shade_at(StageSet::V_ADVECT | StageSet::D_ADVECT, 3, 9, |_| {}, |ring| {
            seed(ring, |uv| {
                let mut o = [None; COLOR_ATTACHMENTS];
                o[Field::VelocityX.slot()] = Some(encode(0.0, Range::Velocity));
                o[Field::VelocityY.slot()] = Some(encode(0.0, Range::Velocity));
                o[Field::Density.slot()] = Some(encode(uv.x * 20.0, Range::Density));
                o
            });
        });
        let uv = texel_center(3, 9, 16, 16);
        assert!((value(&out, Field::Density, Range::Density) - (uv.x * 20.0)).abs() <= 1e-4);
    }

    #[test]
    fn advection_traces_backwards_along_velocity() {
        // trace offset is v * dt / cell; pick dt so it is exactly one texel
        let vx = 0.001;
        let dt = (1.0 / 256.0) / vx;
        let out = shade_at(
            StageSet::V_ADVECT | StageSet::D_ADVECT,
            6,
            4,
            |u| u.delta_time = dt,
            |ring| {
                seed(ring, |uv| {
                    let mut o = [None; COLOR_ATTACHMENTS];
                    o[Field::VelocityX.slot()] = Some(encode(vx, Range::Velocity));
                    o[Field::VelocityY.slot()] = Some(encode(0.0, Range::Velocity));
                    o[Field::Density.slot()] = Some(encode((uv.x * 16.0).floor(), Range::Density));
                    o
                });
            },
        );
        assert!((value(&out, Field::Density, Range::Density) - 5.0).abs() <= 1e-2);
    }
}
