//! Op-amp DC operating point solver
//!
//! Finds the output voltage of an inverting op-amp stage whose feedback and
//! input "resistors" are NMOS transistors in triode mode. With the resistor
//! ratio `n`, current balance through the transistors gives
//!
//! ```text
//! (n + 1)(Vddt - vx)^2 - n(Vddt - vi)^2 - (Vddt - vo(vx))^2 = 0
//! ```
//!
//! where `vo(vx)` is the measured open-loop transfer curve. The root in `vx`
//! is located with Newton-Raphson steps guarded by a shrinking bisection
//! bracket, so a monotone curve always converges.

use super::spline::Spline;
use crate::{Result, SidError};

/// Convergence tolerance on the input voltage (V)
const EPSILON: f64 = 1e-8;

/// Upper bound on iterations before the parameter set is declared degenerate
const MAX_ITERATIONS: usize = 1000;

/// Op-amp stage model
#[derive(Debug, Clone)]
pub struct OpAmp {
    curve: Spline,
    vddt: f64,
    vmin: f64,
    vmax: f64,
    /// Starting guess, carried over between consecutive solves
    x: f64,
}

impl OpAmp {
    /// Create a solver for a transfer curve of `(vin, vout)` samples
    pub fn new(curve: &[(f64, f64)], vddt: f64, vmin: f64, vmax: f64) -> Self {
        Self {
            curve: Spline::new(curve),
            vddt,
            vmin,
            vmax,
            x: vmin,
        }
    }

    /// Restore the deterministic starting guess before a new table column
    pub fn reset(&mut self) {
        self.x = self.vmin;
    }

    /// Output voltage for resistor ratio `n` and input voltage `vin`
    pub fn solve(&mut self, n: f64, vin: f64) -> Result<f64> {
        // f is decreasing in x, so f(ak) > 0 and f(bk) < 0
        let mut ak = self.vmin;
        let mut bk = self.vmax;

        let a = n + 1.0;
        let b = self.vddt;
        let b_vi = (b - vin).max(0.0);
        let c = n * (b_vi * b_vi);

        for _ in 0..MAX_ITERATIONS {
            let xk = self.x;

            let out = self.curve.evaluate(xk);
            let b_vx = (b - xk).max(0.0);
            let b_vo = (b - out.y).max(0.0);

            let f = a * (b_vx * b_vx) - c - (b_vo * b_vo);
            let df = 2.0 * (b_vo * out.dy - a * b_vx);

            self.x -= f / df;

            if (self.x - xk).abs() < EPSILON {
                return Ok(self.curve.evaluate(self.x).y);
            }

            if f < 0.0 {
                bk = xk;
            } else {
                ak = xk;
            }

            if !self.x.is_finite() || self.x <= ak || self.x >= bk {
                self.x = (ak + bk) * 0.5;
            }
        }

        Err(SidError::NoConvergence { n, vin })
    }
}
