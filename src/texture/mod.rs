// texture/ - Encoded simulation grids
//
// A Grid is one RGBA8 render target. Addressing always wraps (the domain
// is a torus), so neighbour stencils and advection traces never need
// bounds checks.

mod ring;

pub use ring::{
    COLOR_ATTACHMENTS, Field, FragmentOutputs, Framebuffer, SamplerBindings, Samplers, TextureRing,
};

use glam::Vec2;

use crate::codec::{self, Range, Texel};

#[derive(Debug, Clone, Default)]
pub struct Grid {
    w: u32,
    h: u32,
    texels: Vec<Texel>,
}

impl Grid {
    /// Zero-filled grid
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h, texels: vec![[0; 4]; (w as usize) * (h as usize)] }
    }

    /// Grid with every texel set to `value`
    pub fn filled(w: u32, h: u32, value: f32, range: Range) -> Self {
        Self { w, h, texels: vec![codec::encode(value, range); (w as usize) * (h as usize)] }
    }

    pub fn width(&self) -> u32 { self.w }
    pub fn height(&self) -> u32 { self.h }
    pub fn is_empty(&self) -> bool { self.texels.is_empty() }
    pub fn texels(&self) -> &[Texel] { &self.texels }

    #[inline]
    fn index(&self, x: i32, y: i32) -> usize {
        let x = x.rem_euclid(self.w as i32) as usize;
        let y = y.rem_euclid(self.h as i32) as usize;
        y * self.w as usize + x
    }

    /// Texel at integer coordinates, wrapping both axes
    #[inline]
    pub fn fetch(&self, x: i32, y: i32) -> Texel {
        self.texels[self.index(x, y)]
    }

    #[inline]
    pub fn store(&mut self, x: i32, y: i32, texel: Texel) {
        let i = self.index(x, y);
        self.texels[i] = texel;
    }

    /// Decoded value at integer coordinates
    #[inline]
    pub fn value(&self, x: i32, y: i32, range: Range) -> f32 {
        codec::decode(self.fetch(x, y), range)
    }

    pub fn set_value(&mut self, x: i32, y: i32, value: f32, range: Range) {
        self.store(x, y, codec::encode(value, range));
    }

    /// Texel whose area contains `uv` (nearest filtering)
    #[inline]
    pub fn texel_at(&self, uv: Vec2) -> Texel {
        let x = (wrap_unit(uv.x) * self.w as f32).floor() as i32;
        let y = (wrap_unit(uv.y) * self.h as f32).floor() as i32;
        self.fetch(x, y)
    }

    /// Bilinearly filtered value at `uv`, with repeat addressing
    pub fn sample(&self, uv: Vec2, range: Range) -> f32 {
        let fx = wrap_unit(uv.x) * self.w as f32 - 0.5;
        let fy = wrap_unit(uv.y) * self.h as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let (x0, y0) = (x0 as i32, y0 as i32);

        let v00 = self.value(x0, y0, range);
        let v10 = self.value(x0 + 1, y0, range);
        let v01 = self.value(x0, y0 + 1, range);
        let v11 = self.value(x0 + 1, y0 + 1, range);

        let bottom = v00 + (v10 - v00) * tx;
        let top = v01 + (v11 - v01) * tx;
        bottom + (top - bottom) * ty
    }

    /// Decode every texel, row-major from the bottom row
    pub fn decode_all(&self, range: Range) -> Vec<f32> {
        self.texels.iter().map(|&t| codec::decode(t, range)).collect()
    }
}

/// Reduce a uv coordinate into [0, 1] before it becomes a texel index.
/// Non-finite coordinates land on the origin.
#[inline]
fn wrap_unit(v: f32) -> f32 {
    if v.is_finite() { v.rem_euclid(1.0) } else { 0.0 }
}

/// Centre of texel (x, y) in uv space
#[inline]
pub fn texel_center(x: u32, y: u32, w: u32, h: u32) -> Vec2 {
    Vec2::new((x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(w: u32, h: u32) -> Grid {
        let mut g = Grid::new(w, h);
        for y in 0..h as i32 {
            for x in 0..w as i32 {
                g.set_value(x, y, (y * w as i32 + x) as f32, Range::Density);
            }
        }
        g
    }

    #[test]
    fn fetch_wraps_in_both_directions() {
        let g = ramp(4, 4);
        assert_eq!(g.fetch(-1, 0), g.fetch(3, 0));
        assert_eq!(g.fetch(4, 0), g.fetch(0, 0));
        assert_eq!(g.fetch(0, -1), g.fetch(0, 3));
        assert_eq!(g.fetch(5, 9), g.fetch(1, 1));
        assert_eq!(g.fetch(-9, -6), g.fetch(3, 2));
    }

    #[test]
    fn sample_at_texel_centre_is_exact() {
        let g = ramp(8, 4);
        for y in 0..4 {
            for x in 0..8 {
                let uv = texel_center(x, y, 8, 4);
                assert!((g.sample(uv, Range::Density) - (g.value(x as i32, y as i32, Range::Density))).abs() <= 1e-4);
            }
        }
    }

    #[test]
    fn sample_interpolates_between_centres() {
        let g = ramp(4, 4);
        // halfway between texels (1,1) and (2,1)
        let uv = Vec2::new(2.0 / 4.0, 1.5 / 4.0);
        let expected = (g.value(1, 1, Range::Density) + g.value(2, 1, Range::Density)) * 0.5;
        assert!((g.sample(uv, Range::Density) - expected).abs() <= 1e-4);
    }

    #[test]
    fn sample_wraps_across_the_seam() {
        let g = ramp(4, 4);
        // halfway between the last column and the first one
        let uv = Vec2::new(0.0, 0.5 / 4.0);
        let expected = (g.value(3, 0, Range::Density) + g.value(0, 0, Range::Density)) * 0.5;
        assert!((g.sample(uv, Range::Density) - expected).abs() <= 1e-4);
        assert!((g.sample(uv + Vec2::new(3.0, -2.0), Range::Density) - expected).abs() <= 1e-4);
    }

    #[test]
    fn far_and_non_finite_coordinates_still_wrap() {
        let g = ramp(4, 4);
        let origin = g.sample(Vec2::new(0.0, 0.5), Range::Density);
        for x in [1.0e12, -1.0e12, f32::INFINITY, f32::NEG_INFINITY] {
            let v = g.sample(Vec2::new(x, 0.5), Range::Density);
            assert!((v - origin).abs() <= 1e-4, "{x}: {v}");
        }
        assert!(g.sample(Vec2::new(f32::NAN, f32::INFINITY), Range::Density).is_finite());
        assert_eq!(g.texel_at(Vec2::new(f32::INFINITY, 0.3)), g.fetch(0, 1));
        assert_eq!(g.texel_at(Vec2::new(1.0e12, 0.3)), g.fetch(0, 1));
    }

    #[test]
    fn filled_grid_is_uniform() {
        let g = Grid::filled(3, 2, -0.0005, Range::Velocity);
        assert!(g.texels().iter().all(|&t| t == g.fetch(0, 0)));
        assert!((g.value(2, 1, Range::Velocity) - (-0.0005)).abs() <= 1e-9);
    }
}
