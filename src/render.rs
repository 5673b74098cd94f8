// render.rs - Display pass: simulation state to canvas pixels
//
// Output is RGBA8, row-major, top row first so the buffer can go straight
// into an ImageData. The surface is lit as if velocity were a height-field
// slope and coloured in HSL space by density.

use glam::{Vec2, Vec3};

use crate::codec::Range;
use crate::texture::{Field, TextureRing};

// Colour ramp (HSL)
const COL_LOW: Vec3 = Vec3::new(0.614, 0.84, 0.19);
const COL_HIGH: Vec3 = Vec3::new(0.503, 1.0, 0.67);
const COL_TINT_HUE: f32 = 0.8;
const DENSITY_COLOR_SCALE: f32 = 0.105;
const DENSITY_COLOR_EXP: f32 = 1.825;

// How much the normals tend upwards
const UPRIGHTNESS: f32 = 0.000_25;

// Lighting
const LIGHT_DIR: Vec3 = Vec3::new(-1.0, -1.0, 0.0);
const LIGHT_LIGHTNESS_STRENGTH: f32 = 0.6;
const LIGHT_TINTING_STRENGTH: f32 = 0.9;

pub struct DisplayPass {
    out: Vec<u8>,
    w: u32,
    h: u32,
    /// Shift hue with slope instead of lightness
    tint_by_velocity: bool,
}

impl DisplayPass {
    pub fn new(w: u32, h: u32) -> Self {
        Self {
            out: vec![0; (w * h * 4) as usize],
            w,
            h,
            tint_by_velocity: false,
        }
    }

    pub fn resize(&mut self, w: u32, h: u32) {
        self.w = w;
        self.h = h;
        self.out.resize((w * h * 4) as usize, 0);
    }

    pub fn set_velocity_tinting(&mut self, on: bool) {
        self.tint_by_velocity = on;
    }

    pub fn clear(&mut self) {
        self.out.fill(0);
    }

    pub fn ptr(&self) -> *const u8 {
        self.out.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.out
    }

    pub fn width(&self) -> u32 { self.w }
    pub fn height(&self) -> u32 { self.h }

    /// Shade every output pixel from the previous-role grids of `ring`.
    /// A positive `delta` looks that far ahead along the flow.
    pub fn render(&mut self, ring: &TextureRing, aspect: f32, delta: f32) {
        if self.w == 0 || self.h == 0 {
            return;
        }
        if !ring.is_allocated() {
            self.clear();
            return;
        }
        let vx = ring.previous(Field::VelocityX);
        let vy = ring.previous(Field::VelocityY);
        let dens = ring.previous(Field::Density);
        let velocity = |uv: Vec2| Vec2::new(vx.sample(uv, Range::Velocity), vy.sample(uv, Range::Velocity));

        // Velocity to texture-coordinate displacement over `delta`
        let vel2tex = Vec2::new(ring.width() as f32 / aspect, ring.height() as f32) * delta;
        let light = LIGHT_DIR.normalize();
        let tint = self.tint_by_velocity;

        let (w, h) = (self.w, self.h);
        for (r, row) in self.out.chunks_exact_mut((w * 4) as usize).enumerate() {
            let v = 1.0 - (r as f32 + 0.5) / h as f32;
            for (c, px) in row.chunks_exact_mut(4).enumerate() {
                let uv = Vec2::new((c as f32 + 0.5) / w as f32, v);

                let (vel, density) = if delta > 0.0 {
                    let ahead = velocity(uv) * vel2tex;
                    let vel = velocity(uv + ahead);
                    (vel, dens.sample(uv + vel * vel2tex, Range::Density))
                } else {
                    (velocity(uv), dens.sample(uv, Range::Density))
                };

                let rgb = shade(vel, density, light, tint);
                px[0] = to_byte(rgb.x);
                px[1] = to_byte(rgb.y);
                px[2] = to_byte(rgb.z);
                px[3] = 255;
            }
        }
    }
}

/// Lit colour of one surface point
#[inline]
fn shade(vel: Vec2, density: f32, light: Vec3, tint: bool) -> Vec3 {
    let n = Vec3::new(vel.x, vel.y, UPRIGHTNESS).normalize();
    let l = (-light).dot(n);

    let t = (density.max(0.0) * DENSITY_COLOR_SCALE).powf(DENSITY_COLOR_EXP).clamp(0.0, 1.0);
    let mut hsl = COL_LOW.lerp(COL_HIGH, t);
    if tint {
        let k = l.abs().powf(0.6) * LIGHT_TINTING_STRENGTH;
        hsl.x += (COL_TINT_HUE - hsl.x) * k;
    } else {
        hsl.z = (hsl.z * (1.0 + l * LIGHT_LIGHTNESS_STRENGTH)).clamp(0.0, 1.0);
    }
    hsl2rgb(hsl)
}

#[inline]
fn to_byte(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Hue, saturation, lightness (all in [0,1]) to RGB
pub fn hsl2rgb(hsl: Vec3) -> Vec3 {
    let c = (1.0 - (2.0 * hsl.z - 1.0).abs()) * hsl.y;
    let slice = hsl.x * 6.0;
    let x = c * (1.0 - (slice.rem_euclid(2.0) - 1.0).abs());
    let m = hsl.z - c * 0.5;

    let rgb = if slice < 1.0 {
        Vec3::new(c, x, 0.0)
    } else if slice < 2.0 {
        Vec3::new(x, c, 0.0)
    } else if slice < 3.0 {
        Vec3::new(0.0, c, x)
    } else if slice < 4.0 {
        Vec3::new(0.0, x, c)
    } else if slice < 5.0 {
        Vec3::new(x, 0.0, c)
    } else {
        Vec3::new(c, 0.0, x)
    };
    rgb + Vec3::splat(m)
}
