//! Monotone cubic interpolation
//!
//! Interpolates a sampled transfer curve with piecewise cubic Hermite
//! segments whose slopes are chosen so that monotone input data stays
//! monotone. Evaluation also yields the derivative, which the op-amp solver
//! needs for its Newton steps. Beyond the last sample the final segment is
//! extrapolated.

use std::cell::Cell;

/// Value and first derivative at a point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Interpolated value
    pub y: f64,
    /// Derivative dy/dx
    pub dy: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Segment {
    x1: f64,
    x2: f64,
    a: f64,
    b: f64,
    c: f64,
    d: f64,
}

/// Piecewise cubic spline over increasing x samples
#[derive(Debug, Clone)]
pub struct Spline {
    segments: Vec<Segment>,
    /// Last segment hit; lookups are strongly sequential during table builds
    cursor: Cell<usize>,
}

impl Spline {
    /// Build from `(x, y)` samples with strictly increasing x
    ///
    /// Callers validate the samples; at least 2 points are required.
    pub fn new(points: &[(f64, f64)]) -> Self {
        debug_assert!(points.len() >= 2);
        let n = points.len() - 1;

        let dxs: Vec<f64> = points.windows(2).map(|w| w[1].0 - w[0].0).collect();
        let ms: Vec<f64> = points
            .windows(2)
            .zip(&dxs)
            .map(|(w, dx)| (w[1].1 - w[0].1) / dx)
            .collect();

        // Degree-1 coefficients (tangents at each sample)
        let mut tangents = vec![0.0; n + 1];
        tangents[0] = ms[0];
        for i in 1..n {
            let (m, m_next) = (ms[i - 1], ms[i]);
            tangents[i] = if m * m_next <= 0.0 {
                0.0
            } else {
                let (dx, dx_next) = (dxs[i - 1], dxs[i]);
                let common = dx + dx_next;
                3.0 * common / ((common + dx_next) / m + (common + dx) / m_next)
            };
        }
        tangents[n] = ms[n - 1];

        let mut segments: Vec<Segment> = (0..n)
            .map(|i| {
                let c = tangents[i];
                let m = ms[i];
                let inv_dx = 1.0 / dxs[i];
                let common = c + tangents[i + 1] - m - m;
                Segment {
                    x1: points[i].0,
                    x2: points[i + 1].0,
                    a: common * inv_dx * inv_dx,
                    b: (m - c - common) * inv_dx,
                    c,
                    d: points[i].1,
                }
            })
            .collect();

        // Extrapolate past the last sample
        if let Some(last) = segments.last_mut() {
            last.x2 = f64::MAX;
        }

        Self {
            segments,
            cursor: Cell::new(0),
        }
    }

    /// Evaluate value and derivative at `x`
    pub fn evaluate(&self, x: f64) -> Point {
        let mut idx = self.cursor.get();
        let seg = &self.segments[idx];
        if x < seg.x1 || x > seg.x2 {
            idx = self
                .segments
                .iter()
                .position(|s| x <= s.x2)
                .unwrap_or(self.segments.len() - 1);
            self.cursor.set(idx);
        }
        let s = &self.segments[idx];

        let diff = x - s.x1;
        Point {
            y: ((s.a * diff + s.b) * diff + s.c) * diff + s.d,
            dy: (3.0 * s.a * diff + 2.0 * s.b) * diff + s.c,
        }
    }
}
