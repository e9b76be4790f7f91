//! R-2R ladder DAC model for the filter cutoff
//!
//! The 6581 ladder has mismatched resistors (2R/R ~ 2.20) and no termination
//! at bit 0, which makes its output non-monotonic ("kinks"). A matched,
//! terminated ladder is exactly binary weighted.

/// Models open circuit from missing termination resistor
const R_INFINITY: f64 = 1e6;

/// Parallel resistance: r1 || r2
fn parallel(r1: f64, r2: f64) -> f64 {
    (r1 * r2) / (r1 + r2)
}

/// Voltage contribution of a single bit in the ladder
fn bit_voltage(set_bit: usize, bits: usize, r2: f64, terminated: bool) -> f64 {
    let r = 1.0;
    let mut vn = 1.0;

    // Tail resistance starts at 2R (terminated) or infinity (unterminated)
    let mut rn = if terminated { r2 } else { R_INFINITY };

    for _ in 0..set_bit {
        rn = if rn == R_INFINITY {
            r + r2
        } else {
            r + parallel(r2, rn)
        };
    }

    // Source transformation at set_bit
    if rn == R_INFINITY {
        rn = r2;
    } else {
        rn = parallel(r2, rn);
        vn *= rn / r2;
    }

    // Repeated source transformation up to the MSB
    for _ in (set_bit + 1)..bits {
        rn += r;
        let i = vn / rn;
        rn = parallel(r2, rn);
        vn = rn * i;
    }

    vn
}

/// Ladder DAC with per-bit weights normalized to a full scale of `2^bits`
#[derive(Debug, Clone)]
pub struct Dac {
    weights: Vec<f64>,
    leakage: f64,
}

impl Dac {
    /// Ladder with the given resistor ratio and termination
    pub fn new(bits: usize, r2r_ratio: f64, terminated: bool, leakage: f64) -> Self {
        let mut weights: Vec<f64> = (0..bits)
            .map(|bit| bit_voltage(bit, bits, r2r_ratio, terminated))
            .collect();

        let scale = weights.iter().sum::<f64>() / (1u64 << bits) as f64;
        for w in &mut weights {
            *w /= scale;
        }

        Self { weights, leakage }
    }

    /// 6581 cutoff ladder
    pub fn kinked(bits: usize) -> Self {
        Self::new(bits, 2.20, false, 0.0075)
    }

    /// Ideal ladder
    pub fn linear(bits: usize) -> Self {
        Self::new(bits, 2.00, true, 0.0)
    }

    /// Output level for a digital input
    pub fn output(&self, input: u32) -> f64 {
        self.weights
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                if input & (1 << i) != 0 {
                    w
                } else {
                    w * self.leakage
                }
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_ladder_is_binary_weighted() {
        let dac = Dac::linear(11);
        let lsb = dac.output(1);
        for input in [2u32, 3, 100, 1024, 2047] {
            assert_relative_eq!(dac.output(input), lsb * input as f64, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_kinked_ladder_is_not_monotone() {
        let dac = Dac::kinked(11);
        let drops = (1..2048u32)
            .filter(|&i| dac.output(i) < dac.output(i - 1))
            .count();
        assert!(drops > 0, "6581 ladder should have kinks");
    }

    #[test]
    fn test_full_scale() {
        assert_relative_eq!(Dac::linear(8).output(0xff), 256.0, max_relative = 1e-9);
        assert_relative_eq!(Dac::kinked(11).output(0x7ff), 2048.0, max_relative = 1e-9);
    }
}
