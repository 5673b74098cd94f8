// path.rs - Scripted pointer motion for headless runs

use std::f32::consts::TAU;

/// Pointer sweeping a circle around the canvas centre
pub struct CirclePath {
    cx: f32,
    cy: f32,
    radius: f32,
    /// Seconds per revolution
    period: f32,
}

impl CirclePath {
    /// Circle filling a third of the smaller canvas side
    pub fn centered(css_w: f32, css_h: f32, period: f32) -> Self {
        Self {
            cx: css_w * 0.5,
            cy: css_h * 0.5,
            radius: css_w.min(css_h) / 3.0,
            period,
        }
    }

    /// Canvas-relative CSS position at `t_ms`
    pub fn at(&self, t_ms: f64) -> (f32, f32) {
        let a = (t_ms as f32 / 1000.0 / self.period).fract() * TAU;
        (self.cx + self.radius * a.cos(), self.cy + self.radius * a.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_on_the_circle() {
        let p = CirclePath::centered(600.0, 300.0, 2.0);
        for i in 0..50 {
            let (x, y) = p.at(i as f64 * 37.0);
            let r = ((x - 300.0).powi(2) + (y - 150.0).powi(2)).sqrt();
            assert!((r - 100.0).abs() < 1e-2);
        }
    }

    #[test]
    fn starts_to_the_right_of_centre() {
        let (x, y) = CirclePath::centered(300.0, 300.0, 1.0).at(0.0);
        assert!((x - 250.0).abs() < 1e-4);
        assert!((y - 150.0).abs() < 1e-4);
    }
}
