//! Filter model lookup tables
//!
//! Replaces per-sample op-amp solving with precomputed 16-bit tables. All
//! voltages are quantized into the op-amp operating range `[vmin, vmax]` as
//! `round(N16 * (v - vmin))`, with `N16 = 65535 / (vmax - vmin)`.
//!
//! Building a model costs one nonlinear solve per table entry (several
//! million per revision), so models are memoized per [`ChipRevision`] by
//! [`FilterModel::shared`]. Tables are frozen once built and shared read-only.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::debug;
use parking_lot::Mutex;

use super::dac::Dac;
use super::integrator::{Integrator, Integrator6581, Integrator8580};
use super::opamp::OpAmp;
use super::revision::{ChipRevision, IntegratorParams, PhysicalParams, THERMAL_VOLTAGE};
use super::spline::Spline;
use crate::{Result, SidError};

/// Number of summer configurations (2-6 inputs)
pub const SUMMER_TABLES: usize = 5;
/// Number of mixer configurations (0-7 inputs)
pub const MIXER_TABLES: usize = 8;
/// Volume steps
pub const VOLUME_TABLES: usize = 16;
/// Resonance steps
pub const RESONANCE_TABLES: usize = 16;
/// Entries in one full table
pub const TABLE_SIZE: usize = 1 << 16;
/// Cutoff DAC resolution
pub const DAC_BITS: usize = 11;

/// Maps voltages to 16-bit codes for one operating range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    vmin: f64,
    vmax: f64,
    n16: f64,
}

impl Normalizer {
    /// Normalizer for `[vmin, vmax]`
    pub fn new(vmin: f64, vmax: f64) -> Self {
        Self {
            vmin,
            vmax,
            n16: f64::from(u16::MAX) / (vmax - vmin),
        }
    }

    /// Code scale factor
    pub fn n16(&self) -> f64 {
        self.n16
    }

    /// Quantize a voltage, rejecting anything outside the range
    pub fn value(&self, v: f64) -> Result<u16> {
        self.checked(self.n16 * (v - self.vmin))
    }

    /// Quantize a voltage, saturating at the range bounds
    pub fn value_saturating(&self, v: f64) -> u16 {
        let tmp = self.n16 * (v - self.vmin);
        (tmp + 0.5).clamp(0.0, f64::from(u16::MAX)) as u16
    }

    /// Round an already scaled value to a code
    fn code(&self, tmp: f64) -> Option<u16> {
        (tmp > -0.5 && tmp < 65535.5).then(|| (tmp + 0.5) as u16)
    }

    /// Round an already scaled value, reporting the voltage it stands for
    fn checked(&self, tmp: f64) -> Result<u16> {
        self.code(tmp).ok_or(SidError::OutOfRange {
            value: tmp / self.n16 + self.vmin,
            vmin: self.vmin,
            vmax: self.vmax,
        })
    }
}

/// 6581 voltage-controlled resistor tables
pub struct VcrTables {
    /// Gate voltage: nVddt - sqrt(i * 2^16)
    pub n_vg: Box<[u16]>,
    /// EKV current term ln^2(1 + e^(kVgt_Vx / 2Ut)), scaled
    pub n_ids_term: Box<[u16]>,
    /// Cutoff voltage per 11-bit FC value, kinked ladder
    pub f0_kinked: Box<[u16]>,
    /// Cutoff voltage per 11-bit FC value, ideal ladder
    pub f0_linear: Box<[u16]>,
    /// Normalized Vddt
    pub n_vddt: u16,
    /// Threshold voltage in code units (not offset by vmin)
    pub n_vt: i32,
    /// Snake transistor current factor
    pub n_snake: u16,
}

impl VcrTables {
    /// Normalized cutoff voltage for an FC value
    pub fn f0(&self, fc: u16, kinked: bool) -> u16 {
        let table = if kinked {
            &self.f0_kinked
        } else {
            &self.f0_linear
        };
        table[(fc as usize) & ((1 << DAC_BITS) - 1)]
    }
}

/// 8580 switched-capacitor constants
pub struct SwitchedCapTables {
    /// Normalized gate overdrive Vg - Vth
    pub n_vgt: u16,
    /// Current factor of the cutoff transistor array per 11-bit FC value
    pub n_dac: Box<[u16]>,
}

impl SwitchedCapTables {
    /// Current factor for an FC value
    pub fn n_dac(&self, fc: u16) -> u16 {
        self.n_dac[(fc as usize) & ((1 << DAC_BITS) - 1)]
    }
}

/// Combined W/L of the cutoff transistors switched in by `fc`
///
/// Bit i enables a transistor of width `dac_wl * 2^i`. With no bits set the
/// array still conducts through roughly half the smallest transistor.
pub fn cutoff_wl(fc: u16, dac_wl: f64) -> f64 {
    if fc == 0 {
        return dac_wl / 2.0;
    }
    (0..DAC_BITS)
        .filter(|bit| fc & (1 << bit) != 0)
        .map(|bit| dac_wl * f64::from(1u32 << bit))
        .sum()
}

/// Revision-specific integrator data
#[derive(Debug, Clone)]
pub enum RevisionTables {
    /// 6581 VCR model
    Vcr(Arc<VcrTables>),
    /// 8580 switched capacitor model
    SwitchedCapacitor(Arc<SwitchedCapTables>),
}

/// Frozen lookup tables for one physical parameter set
pub struct FilterModel {
    params: PhysicalParams,
    norm: Normalizer,
    curr_factor_coeff: f64,
    summer: Vec<Box<[u16]>>,
    mixer: Vec<Box<[u16]>>,
    volume: Vec<Box<[u16]>>,
    resonance: Vec<Box<[u16]>>,
    opamp_rev: Box<[u16]>,
    revision_tables: RevisionTables,
}

static MODEL_CACHE: Mutex<Vec<(ChipRevision, Arc<FilterModel>)>> =
    parking_lot::const_mutex(Vec::new());

impl FilterModel {
    /// Memoized model for a revision, built on first use
    pub fn shared(revision: ChipRevision) -> Result<Arc<FilterModel>> {
        let mut cache = MODEL_CACHE.lock();
        if let Some((_, model)) = cache.iter().find(|(rev, _)| *rev == revision) {
            debug!("filter model cache hit for {}", revision.name());
            return Ok(Arc::clone(model));
        }

        let model = Arc::new(FilterModel::build(&revision.params())?);
        cache.push((revision, Arc::clone(&model)));
        Ok(model)
    }

    /// Build all tables for a parameter set
    ///
    /// Deterministic: identical parameters yield bit-identical tables.
    pub fn build(params: &PhysicalParams) -> Result<FilterModel> {
        params.validate()?;
        let started = Instant::now();

        let vmin = params.vmin();
        let vmax = params.vmax();
        let norm = Normalizer::new(vmin, vmax);
        let denorm = vmax - vmin;
        let curr_factor_coeff = denorm * (params.ucox / 2.0 * 1.0e-6 / params.capacitance);

        debug!(
            "building filter model: vmin {vmin:.3} V, vmax {vmax:.3} V, N16 {:.3}",
            norm.n16()
        );

        // Integrator constants are cheap, fail on them before the solver runs
        let revision_tables = build_revision_tables(params, &norm, curr_factor_coeff)?;

        let opamp = || OpAmp::new(&params.opamp_curve, params.vddt(), vmin, vmax);

        // Columns reset the solver, so families are independent
        let (summer, mixer, volume, resonance) = thread::scope(|s| {
            let summer = s.spawn(|| build_summer_tables(&mut opamp(), &norm));
            let mixer = s.spawn(|| build_mixer_tables(&mut opamp(), &norm, params.mixer_ratio));
            let volume =
                s.spawn(|| build_volume_tables(&mut opamp(), &norm, params.volume_divisor));
            let resonance = s.spawn(|| {
                let ratios: Vec<f64> = (0..RESONANCE_TABLES as u8)
                    .map(|res| params.resonance.ratio(res))
                    .collect();
                build_resonance_tables(&mut opamp(), &norm, &ratios)
            });
            (join(summer), join(mixer), join(volume), join(resonance))
        });

        let model = FilterModel {
            params: params.clone(),
            norm,
            curr_factor_coeff,
            summer: summer?,
            mixer: mixer?,
            volume: volume?,
            resonance: resonance?,
            opamp_rev: build_opamp_rev(params, &norm),
            revision_tables,
        };

        debug!("filter model built in {:?}", started.elapsed());
        Ok(model)
    }

    /// Fresh integrator for one filter stage of this model
    pub fn build_integrator(self: &Arc<Self>) -> Integrator {
        match &self.revision_tables {
            RevisionTables::Vcr(vcr) => {
                Integrator::Vcr(Integrator6581::new(Arc::clone(self), Arc::clone(vcr)))
            }
            RevisionTables::SwitchedCapacitor(sc) => Integrator::SwitchedCapacitor(
                Integrator8580::new(Arc::clone(self), Arc::clone(sc)),
            ),
        }
    }

    /// Physical parameters the tables were built from
    pub fn params(&self) -> &PhysicalParams {
        &self.params
    }

    /// Summer table for `i + 2` inputs
    pub fn summer(&self, i: usize) -> &[u16] {
        &self.summer[i]
    }

    /// Mixer table for `i` inputs
    pub fn mixer(&self, i: usize) -> &[u16] {
        &self.mixer[i]
    }

    /// Volume table for a 4-bit volume
    pub fn volume(&self, vol: usize) -> &[u16] {
        &self.volume[vol]
    }

    /// Resonance table for a 4-bit resonance
    pub fn resonance(&self, res: usize) -> &[u16] {
        &self.resonance[res]
    }

    /// Reverse op-amp transfer
    #[inline]
    pub fn opamp_rev(&self, i: usize) -> u16 {
        self.opamp_rev[i.min(TABLE_SIZE - 1)]
    }

    /// Revision-specific integrator data
    pub fn revision_tables(&self) -> &RevisionTables {
        &self.revision_tables
    }

    /// Voltage normalizer for this model
    pub fn normalizer(&self) -> &Normalizer {
        &self.norm
    }

    /// Quantize a voltage into a table code
    pub fn normalized_value(&self, v: f64) -> Result<u16> {
        self.norm.value(v)
    }

    /// Current factor for a transistor W/L, 1 cycle at 1 MHz, scaled by 2^13
    pub fn normalized_current_factor(&self, wl: f64) -> Result<u16> {
        current_factor(&self.norm, self.curr_factor_coeff, wl)
    }

    /// Normalized vmin
    pub fn n_vmin(&self) -> Result<u16> {
        let vmin = self.params.vmin();
        self.norm.checked(self.norm.n16() * vmin)
    }

    /// Code for a voice output level in [-1, 1]
    pub fn normalized_voice(&self, level: f32) -> i32 {
        let level = f64::from(level.clamp(-1.0, 1.0));
        let v = level * self.params.voice_voltage_range + self.params.voice_dc_voltage;
        i32::from(self.norm.value_saturating(v))
    }
}

impl fmt::Debug for FilterModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterModel")
            .field("norm", &self.norm)
            .field("curr_factor_coeff", &self.curr_factor_coeff)
            .field("revision_tables", &self.revision_tables)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for VcrTables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VcrTables")
            .field("n_vddt", &self.n_vddt)
            .field("n_vt", &self.n_vt)
            .field("n_snake", &self.n_snake)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for SwitchedCapTables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitchedCapTables")
            .field("n_vgt", &self.n_vgt)
            .finish_non_exhaustive()
    }
}

fn current_factor(norm: &Normalizer, coeff: f64, wl: f64) -> Result<u16> {
    let tmp = f64::from(1u32 << 13) * coeff * wl;
    norm.code(tmp).ok_or_else(|| {
        SidError::InvalidParameters(format!("current factor overflow for W/L {wl}"))
    })
}

fn build_revision_tables(
    p: &PhysicalParams,
    norm: &Normalizer,
    curr_factor_coeff: f64,
) -> Result<RevisionTables> {
    match p.integrator {
        IntegratorParams::Vcr {
            wl_vcr,
            wl_snake,
            dac_zero,
            dac_scale,
        } => {
            let n16 = norm.n16();
            let n_vddt = n16 * (p.vddt() - p.vmin());

            // Indexed by the squared gate term right-shifted 16 times
            let n_vg = (0..TABLE_SIZE)
                .map(|i| norm.checked(n_vddt - ((i as f64) * 65536.0).sqrt()))
                .collect::<Result<Box<[u16]>>>()?;

            // EKV model: Ids = Is * (if - ir), if = ln^2(1 + e^((k(Vg - Vt) - Vs) / 2Ut))
            let is = 2.0 * p.ucox * THERMAL_VOLTAGE * THERMAL_VOLTAGE * wl_vcr;
            let n15 = f64::from(i16::MAX) / (p.vmax() - p.vmin());
            let n_is = n15 * 1.0e-6 / p.capacitance * is;
            let n_ids_term = (0..TABLE_SIZE)
                .map(|k| {
                    let log_term = ((k as f64 / n16) / (2.0 * THERMAL_VOLTAGE))
                        .exp()
                        .ln_1p();
                    norm.checked(n_is * log_term * log_term)
                })
                .collect::<Result<Box<[u16]>>>()?;

            let f0_table = |dac: Dac| {
                (0..1u32 << DAC_BITS)
                    .map(|fc| {
                        let v =
                            dac_zero + dac.output(fc) * dac_scale / f64::from(1u32 << DAC_BITS);
                        norm.value(v)
                    })
                    .collect::<Result<Box<[u16]>>>()
            };

            Ok(RevisionTables::Vcr(Arc::new(VcrTables {
                n_vg,
                n_ids_term,
                f0_kinked: f0_table(Dac::kinked(DAC_BITS))?,
                f0_linear: f0_table(Dac::linear(DAC_BITS))?,
                n_vddt: norm.value(p.vddt())?,
                n_vt: (n16 * p.vth + 0.5) as i32,
                n_snake: current_factor(norm, curr_factor_coeff, wl_snake)?,
            })))
        }
        IntegratorParams::SwitchedCapacitor {
            vref,
            gate_ratio,
            dac_wl,
        } => {
            if !(gate_ratio > 1.0 && gate_ratio < 2.0) {
                return Err(SidError::InvalidParameters(format!(
                    "gate divider ratio {gate_ratio} outside (1, 2)"
                )));
            }
            let n_dac = (0..1u16 << DAC_BITS)
                .map(|fc| current_factor(norm, curr_factor_coeff, cutoff_wl(fc, dac_wl)))
                .collect::<Result<Box<[u16]>>>()?;
            Ok(RevisionTables::SwitchedCapacitor(Arc::new(SwitchedCapTables {
                n_vgt: norm.value(vref * gate_ratio - p.vth)?,
                n_dac,
            })))
        }
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

/// One table column: `size` entries of `solve(n, vmin + vi / N16 / idiv)`
fn build_column(
    opamp: &mut OpAmp,
    norm: &Normalizer,
    n: f64,
    size: usize,
    idiv: f64,
) -> Result<Box<[u16]>> {
    opamp.reset();
    (0..size)
        .map(|vi| {
            let vin = norm.vmin + vi as f64 / norm.n16 / idiv;
            norm.value(opamp.solve(n, vin)?)
        })
        .collect()
}

/// Filter summer, n ~ 1, with 2-6 input "resistors"
///
/// All "on" transistors are modeled as one, which is not exact since each
/// input sees a different voltage, but modeling them separately would be
/// far too costly.
pub fn build_summer_tables(opamp: &mut OpAmp, norm: &Normalizer) -> Result<Vec<Box<[u16]>>> {
    (0..SUMMER_TABLES)
        .map(|i| {
            let idiv = 2 + i;
            build_column(opamp, norm, idiv as f64, idiv << 16, idiv as f64)
        })
        .collect()
}

/// Output mixer with 0-7 inputs; n ~ 8/6 (6581) or 8/5 (8580) per input
pub fn build_mixer_tables(
    opamp: &mut OpAmp,
    norm: &Normalizer,
    n_ratio: f64,
) -> Result<Vec<Box<[u16]>>> {
    (0..MIXER_TABLES)
        .map(|i| {
            let idiv = i.max(1);
            let size = if i == 0 { 1 } else { i << 16 };
            build_column(opamp, norm, i as f64 * n_ratio, size, idiv as f64)
        })
        .collect()
}

/// Master volume, gain ~ vol / divisor (12 for 6581, 16 for 8580)
pub fn build_volume_tables(
    opamp: &mut OpAmp,
    norm: &Normalizer,
    divisor: f64,
) -> Result<Vec<Box<[u16]>>> {
    (0..VOLUME_TABLES)
        .map(|vol| build_column(opamp, norm, vol as f64 / divisor, TABLE_SIZE, 1.0))
        .collect()
}

/// Band-pass resonance gain, one table per effective ratio
pub fn build_resonance_tables(
    opamp: &mut OpAmp,
    norm: &Normalizer,
    ratios: &[f64],
) -> Result<Vec<Box<[u16]>>> {
    ratios
        .iter()
        .map(|&n| build_column(opamp, norm, n, TABLE_SIZE, 1.0))
        .collect()
}

/// Capacitor voltage to op-amp input voltage, in code space
///
/// Past the measured curve the op-amp is saturated, so codes clamp to the
/// table range instead of extrapolating.
fn build_opamp_rev(params: &PhysicalParams, norm: &Normalizer) -> Box<[u16]> {
    let n16 = norm.n16();
    let scaled: Vec<(f64, f64)> = params
        .opamp_curve
        .iter()
        .map(|&(vin, vout)| {
            (
                n16 * (vin - vout) / 2.0 + f64::from(1u32 << 15),
                n16 * (vin - norm.vmin),
            )
        })
        .collect();

    let spline = Spline::new(&scaled);
    (0..TABLE_SIZE)
        .map(|x| {
            let y = spline.evaluate(x as f64).y;
            (y + 0.5).clamp(0.0, f64::from(u16::MAX)) as u16
        })
        .collect()
}
