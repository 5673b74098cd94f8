// noise.rs - 3D simplex noise
//
// Classic Perlin/Gustavson simplex noise over the reference permutation
// table. Pure and deterministic; output is roughly in [-1, 1].

use glam::{IVec3, Vec3};

// Skewing factors for 3D
const F3: f32 = 1.0 / 3.0;
const G3: f32 = 1.0 / 6.0;

/// Reference permutation table
pub const PERM: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225,
    140, 36, 103, 30, 69, 142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148,
    247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219, 203, 117, 35, 11, 32,
    57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122,
    60, 211, 133, 230, 220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54,
    65, 25, 63, 161, 1, 216, 80, 73, 209, 76, 132, 187, 208, 89, 18, 169,
    200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198, 173, 186, 3, 64,
    52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212,
    207, 206, 59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213,
    119, 248, 152, 2, 44, 154, 163, 70, 221, 153, 101, 155, 167, 43, 172, 9,
    129, 22, 39, 253, 19, 98, 108, 110, 79, 113, 224, 232, 178, 185, 112, 104,
    218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12, 191, 179, 162, 241,
    81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157,
    184, 84, 204, 176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93,
    222, 114, 67, 29, 24, 72, 243, 141, 128, 195, 78, 66, 215, 61, 156, 180,
];

#[inline(always)]
fn hash(i: i32) -> i32 {
    PERM[(i & 255) as usize] as i32
}

/// Dot product of `p` with one of 12 gradient directions picked by `hash`
#[inline(always)]
fn grad(hash: i32, p: Vec3) -> f32 {
    let h = hash & 15;
    let u = if h < 8 { p.x } else { p.y };
    let v = if h < 4 {
        p.y
    } else if h == 12 || h == 14 {
        p.x
    } else {
        p.z
    };
    (if h & 1 == 1 { -u } else { u }) + (if h & 2 == 2 { -v } else { v })
}

#[inline(always)]
fn corner(hash: i32, d: Vec3) -> f32 {
    let t = 0.6 - d.length_squared();
    if t < 0.0 {
        0.0
    } else {
        let t2 = t * t;
        t2 * t2 * grad(hash, d)
    }
}

/// Simplex noise at `pos`
pub fn simplex3(pos: Vec3) -> f32 {
    // Enclosing cell in skewed space
    let s = (pos.x + pos.y + pos.z) * F3;
    let cell = (pos + Vec3::splat(s)).floor().as_ivec3();
    let t = (cell.x + cell.y + cell.z) as f32 * G3;
    let d0 = pos - (cell.as_vec3() - Vec3::splat(t));

    // Which of the six simplices we are in
    let (o1, o2) = if d0.x >= d0.y {
        if d0.y >= d0.z {
            (IVec3::new(1, 0, 0), IVec3::new(1, 1, 0))
        } else if d0.x >= d0.z {
            (IVec3::new(1, 0, 0), IVec3::new(1, 0, 1))
        } else {
            (IVec3::new(0, 0, 1), IVec3::new(1, 0, 1))
        }
    } else if d0.y < d0.z {
        (IVec3::new(0, 0, 1), IVec3::new(0, 1, 1))
    } else if d0.x < d0.z {
        (IVec3::new(0, 1, 0), IVec3::new(0, 1, 1))
    } else {
        (IVec3::new(0, 1, 0), IVec3::new(1, 1, 0))
    };

    let d1 = d0 - o1.as_vec3() + Vec3::splat(G3);
    let d2 = d0 - o2.as_vec3() + Vec3::splat(2.0 * G3);
    let d3 = d0 - Vec3::ONE + Vec3::splat(3.0 * G3);

    let gi = |o: IVec3| {
        let c = cell + o;
        hash(c.x + hash(c.y + hash(c.z)))
    };

    let n = corner(gi(IVec3::ZERO), d0)
        + corner(gi(o1), d1)
        + corner(gi(o2), d2)
        + corner(gi(IVec3::ONE), d3);

    n * 32.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_at_lattice_origin() {
        // every corner contribution vanishes or cancels at a lattice point
        assert_eq!(simplex3(Vec3::ZERO), 0.0);
    }

    #[test]
    fn permutation_is_a_bijection() {
        let mut seen = [false; 256];
        for &p in PERM.iter() {
            assert!(!seen[p as usize]);
            seen[p as usize] = true;
        }
    }

    #[test]
    fn varies_across_space() {
        let a = simplex3(Vec3::new(0.31, 0.77, 0.0));
        let b = simplex3(Vec3::new(2.13, 1.41, 0.5));
        assert_ne!(a, b);
    }

    #[test]
    fn small_steps_give_small_changes() {
        let mut prev = simplex3(Vec3::new(0.0, 0.4, 0.25));
        for i in 1..2000 {
            let p = Vec3::new(i as f32 * 0.001, 0.4, 0.25);
            let cur = simplex3(p);
            assert!((cur - prev).abs() < 0.05, "jump at {p:?}");
            prev = cur;
        }
    }

    proptest! {
        #[test]
        fn deterministic(x in -50.0f32..50.0, y in -50.0f32..50.0, z in -50.0f32..50.0) {
            let p = Vec3::new(x, y, z);
            prop_assert_eq!(simplex3(p).to_bits(), simplex3(p).to_bits());
        }

        #[test]
        fn bounded(x in -50.0f32..50.0, y in -50.0f32..50.0, z in -50.0f32..50.0) {
            let n = simplex3(Vec3::new(x, y, z));
            prop_assert!(n.is_finite());
            prop_assert!(n.abs() <= 1.1, "{n}");
        }
    }
}
