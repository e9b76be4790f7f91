//! Chip revisions and their physical parameter sets
//!
//! Each revision is a tag that carries everything the analog model needs:
//! transistor parameters, the measured op-amp transfer curve, output stage
//! ratios and the integrator flavour. Building the model is a pure function
//! of these values.

use serde::{Deserialize, Serialize};

use crate::{Result, SidError};

/// Thermal voltage Ut = kT/q at room temperature (~26 mV)
pub const THERMAL_VOLTAGE: f64 = 26.0e-3;

/// SID silicon revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChipRevision {
    /// Original NMOS part with the characteristic nonlinear filter
    #[default]
    Mos6581,
    /// HMOS-II part with the cleaner, more linear filter
    Mos8580,
}

impl ChipRevision {
    /// All supported revisions
    pub const ALL: [ChipRevision; 2] = [ChipRevision::Mos6581, ChipRevision::Mos8580];

    /// Physical parameter set for this revision
    pub fn params(self) -> PhysicalParams {
        match self {
            ChipRevision::Mos6581 => PhysicalParams {
                voice_voltage_range: 1.5,
                voice_dc_voltage: 5.075,
                capacitance: 470e-12,
                vdd: 12.18,
                vth: 1.31,
                ucox: 20e-6,
                opamp_curve: OPAMP_CURVE_6581.to_vec(),
                mixer_ratio: 8.0 / 6.0,
                volume_divisor: 12.0,
                resonance: ResonanceCurve::InverseEighths,
                integrator: IntegratorParams::Vcr {
                    wl_vcr: 9.0 / 1.0,
                    wl_snake: 1.0 / 115.0,
                    dac_zero: 6.65,
                    dac_scale: 2.63,
                },
            },
            ChipRevision::Mos8580 => PhysicalParams {
                voice_voltage_range: 0.24,
                voice_dc_voltage: 4.84,
                capacitance: 22e-9,
                vdd: 9.09,
                vth: 0.80,
                ucox: 100e-6,
                opamp_curve: OPAMP_CURVE_8580.to_vec(),
                mixer_ratio: 8.0 / 5.0,
                volume_divisor: 16.0,
                resonance: ResonanceCurve::Exponential,
                integrator: IntegratorParams::SwitchedCapacitor {
                    vref: 4.76,
                    gate_ratio: 1.5,
                    dac_wl: 0.00615,
                },
            },
        }
    }

    /// Short model name
    pub fn name(self) -> &'static str {
        match self {
            ChipRevision::Mos6581 => "6581",
            ChipRevision::Mos8580 => "8580",
        }
    }
}

/// Mapping from the 4-bit resonance control to the resonance op-amp ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResonanceCurve {
    /// 1/Q ~ ~res/8
    InverseEighths,
    /// 1/Q ~ 2^((4 - res)/8)
    Exponential,
}

impl ResonanceCurve {
    /// Effective resistor ratio for a resonance setting (0-15)
    pub fn ratio(self, res: u8) -> f64 {
        let res = res & 0x0f;
        match self {
            ResonanceCurve::InverseEighths => f64::from(!res & 0x0f) / 8.0,
            ResonanceCurve::Exponential => 2f64.powf((4.0 - f64::from(res)) / 8.0),
        }
    }
}

/// Integrator flavour and its constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntegratorParams {
    /// 6581: voltage-controlled resistor in parallel with the "snake" transistor
    Vcr {
        /// VCR transistor W/L
        wl_vcr: f64,
        /// Snake transistor W/L
        wl_snake: f64,
        /// Cutoff DAC zero offset (V)
        dac_zero: f64,
        /// Cutoff DAC full-scale span (V)
        dac_scale: f64,
    },
    /// 8580: switched-capacitor transistor array
    SwitchedCapacitor {
        /// Reference voltage of the gate divider (V)
        vref: f64,
        /// Gate divider ratio (1 < ratio < 2)
        gate_ratio: f64,
        /// W/L of the least significant cutoff transistor
        dac_wl: f64,
    },
}

/// Physical parameters from which all lookup tables are derived
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalParams {
    /// Voice output swing (V)
    pub voice_voltage_range: f64,
    /// Voice output DC level (V)
    pub voice_dc_voltage: f64,
    /// Integrator capacitor (F)
    pub capacitance: f64,
    /// Supply voltage (V)
    pub vdd: f64,
    /// Threshold voltage (V)
    pub vth: f64,
    /// Transconductance coefficient u*Cox
    pub ucox: f64,
    /// Measured op-amp transfer curve as (vin, vout) pairs, vin increasing
    pub opamp_curve: Vec<(f64, f64)>,
    /// Mixer op-amp n per active input
    pub mixer_ratio: f64,
    /// Volume ladder divisor (gain ~ vol / divisor)
    pub volume_divisor: f64,
    /// Resonance control mapping
    pub resonance: ResonanceCurve,
    /// Integrator flavour
    pub integrator: IntegratorParams,
}

impl PhysicalParams {
    /// Vdd - Vth
    pub fn vddt(&self) -> f64 {
        self.vdd - self.vth
    }

    /// Lower bound of the op-amp operating range
    pub fn vmin(&self) -> f64 {
        self.opamp_curve.first().map_or(0.0, |p| p.0)
    }

    /// Upper bound of the op-amp operating range
    pub fn vmax(&self) -> f64 {
        let first_out = self.opamp_curve.first().map_or(0.0, |p| p.1);
        self.vddt().max(first_out)
    }

    /// Reject parameter sets that cannot produce in-range tables
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SidError::InvalidParameters(msg));

        if self.opamp_curve.len() < 3 {
            return invalid(format!(
                "op-amp curve needs at least 3 points, got {}",
                self.opamp_curve.len()
            ));
        }
        if self
            .opamp_curve
            .iter()
            .any(|&(x, y)| !x.is_finite() || !y.is_finite())
        {
            return invalid("op-amp curve contains non-finite values".into());
        }
        if let Some(w) = self.opamp_curve.windows(2).find(|w| w[0].0 >= w[1].0) {
            return invalid(format!(
                "op-amp curve input not increasing at {} V",
                w[1].0
            ));
        }
        let scalars = [
            ("capacitance", self.capacitance),
            ("ucox", self.ucox),
            ("mixer_ratio", self.mixer_ratio),
            ("volume_divisor", self.volume_divisor),
            ("voice_voltage_range", self.voice_voltage_range),
        ];
        if let Some((name, value)) = scalars.iter().find(|(_, v)| !(v.is_finite() && *v > 0.0)) {
            return invalid(format!("{name} must be positive, got {value}"));
        }
        if self.vddt() <= 0.0 {
            return invalid(format!("Vdd {} must exceed Vth {}", self.vdd, self.vth));
        }
        let (vmin, vmax) = (self.vmin(), self.vmax());
        if vmin >= vmax {
            return invalid(format!("vmin {vmin} V is not below vmax {vmax} V"));
        }
        Ok(())
    }
}

/// 6581 op-amp voltage transfer (vin, vout), measured on a real chip
const OPAMP_CURVE_6581: [(f64, f64); 33] = [
    (0.81, 10.31), // Approximate start of actual range
    (2.40, 10.31),
    (2.60, 10.30),
    (2.70, 10.29),
    (2.80, 10.26),
    (2.90, 10.17),
    (3.00, 10.04),
    (3.10, 9.83),
    (3.20, 9.58),
    (3.30, 9.32),
    (3.50, 8.69),
    (3.70, 8.00),
    (4.00, 6.89),
    (4.40, 5.21),
    (4.54, 4.54), // Working point (vi = vo)
    (4.60, 4.19),
    (4.80, 3.00),
    (4.90, 2.30), // Change of curvature
    (4.95, 2.03),
    (5.00, 1.88),
    (5.05, 1.77),
    (5.10, 1.69),
    (5.20, 1.58),
    (5.40, 1.44),
    (5.60, 1.33),
    (5.80, 1.25),
    (6.00, 1.19),
    (6.40, 1.12), // Approximate end of actual range
    (6.80, 1.08),
    (7.20, 1.06),
    (7.60, 1.04),
    (8.00, 1.03),
    (8.40, 1.02),
];

/// 8580 op-amp voltage transfer (vin, vout)
const OPAMP_CURVE_8580: [(f64, f64); 21] = [
    (1.30, 8.91), // Approximate start of actual range
    (4.76, 8.91),
    (4.77, 8.90),
    (4.78, 8.88),
    (4.785, 8.86),
    (4.79, 8.80),
    (4.795, 8.60),
    (4.80, 8.25),
    (4.805, 7.50),
    (4.81, 6.10),
    (4.815, 4.05), // Change of curvature
    (4.82, 2.27),
    (4.825, 1.65),
    (4.83, 1.55),
    (4.84, 1.47),
    (4.85, 1.43),
    (4.87, 1.37),
    (4.90, 1.34),
    (5.00, 1.30),
    (5.10, 1.30),
    (8.91, 1.30), // Approximate end of actual range
];
