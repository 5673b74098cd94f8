// codec.rs - Scalar <-> RGBA8 channel packing
//
// Simulation grids are plain 8-bit-per-channel textures, so every scalar
// is stored as a 4-digit base-256 fixed-point fraction of its range:
//
//   n = clamp(normalized(value), 0, 1)
//   q = round(n * 256^4)             (saturates at 256^4 - 1)
//   texel = [q >> 24, q >> 16, q >> 8, q] as bytes, most significant first
//
// Decoding is the weighted digit sum r/256 + g/256^2 + b/256^3 + a/256^4,
// scaled back into the range. It is linear in the channels, which is what
// makes bilinear filtering of encoded grids meaningful.

/// One encoded grid cell.
pub type Texel = [u8; 4];

const DIGIT: f64 = 256.0;
const FULL_SCALE: f64 = DIGIT * DIGIT * DIGIT * DIGIT;

/// Velocity components live in [-V_BOUND, V_BOUND]
pub const V_BOUND: f32 = 0.00125;
/// Projection values live in [-P_BOUND, P_BOUND]
pub const P_BOUND: f32 = 10.0;
/// Density lives in [0, D_BOUND]
pub const D_BOUND: f32 = 100.0;

/// The three quantities a texel can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Range {
    Velocity,
    Projection,
    Density,
}

impl Range {
    pub fn bound(self) -> f32 {
        match self {
            Range::Velocity => V_BOUND,
            Range::Projection => P_BOUND,
            Range::Density => D_BOUND,
        }
    }

    pub fn is_signed(self) -> bool {
        !matches!(self, Range::Density)
    }

    /// Smallest representable value
    pub fn min(self) -> f32 {
        if self.is_signed() { -self.bound() } else { 0.0 }
    }

    /// Largest representable value
    pub fn max(self) -> f32 {
        self.bound()
    }

    /// Distance between two adjacent representable values
    pub fn quantum(self) -> f32 {
        ((self.max() - self.min()) as f64 / FULL_SCALE) as f32
    }

    #[inline]
    fn normalize(self, value: f32) -> f64 {
        let b = self.bound() as f64;
        let v = value as f64;
        if self.is_signed() { v / b * 0.5 + 0.5 } else { v / b }
    }

    #[inline]
    fn denormalize(self, n: f64) -> f32 {
        let b = self.bound() as f64;
        let v = if self.is_signed() { (n - 0.5) * 2.0 * b } else { n * b };
        v as f32
    }
}

/// Pack `value` into a texel. Out-of-range values saturate silently;
/// NaN packs as the range minimum.
pub fn encode(value: f32, range: Range) -> Texel {
    let n = range.normalize(value);
    let n = if n.is_nan() { 0.0 } else { n.clamp(0.0, 1.0) };
    let q = (n * FULL_SCALE).round().min(FULL_SCALE - 1.0) as u32;
    q.to_be_bytes()
}

/// Unpack a texel written by [`encode`].
pub fn decode(texel: Texel, range: Range) -> f32 {
    range.denormalize(unpack(texel))
}

/// Digit-weighted sum in [0, 1)
#[inline]
pub fn unpack(texel: Texel) -> f64 {
    let [r, g, b, a] = texel;
    r as f64 / DIGIT
        + g as f64 / (DIGIT * DIGIT)
        + b as f64 / (DIGIT * DIGIT * DIGIT)
        + a as f64 / FULL_SCALE
}
