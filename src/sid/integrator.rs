//! Filter integrator stages
//!
//! Each state-variable filter has two integrators (high-pass to band-pass,
//! band-pass to low-pass). They run in the normalized 16-bit code space of
//! the [`FilterModel`]; the capacitor charge `vc` is kept with 15 extra
//! fractional bits and mapped back to the op-amp input through the reverse
//! op-amp table.

use std::sync::Arc;

use super::model::{FilterModel, SwitchedCapTables, VcrTables, TABLE_SIZE};

/// Index into the reverse op-amp table for a capacitor charge
#[inline]
fn opamp_rev_index(vc: i64) -> usize {
    ((vc >> 15) + (1 << 15)).clamp(0, TABLE_SIZE as i64 - 1) as usize
}

/// 6581 integrator: VCR transistor in parallel with the "snake" transistor
///
/// The snake is a plain NMOS in triode mode. The VCR gate is driven from a
/// voltage derived from the cutoff DAC output `Vw`, and its drain current is
/// taken from the EKV model table.
#[derive(Debug, Clone)]
pub struct Integrator6581 {
    model: Arc<FilterModel>,
    vcr: Arc<VcrTables>,
    n_vddt_vw_2: i64,
    vx: i64,
    vc: i64,
}

impl Integrator6581 {
    /// Integrator backed by a model's VCR tables
    pub fn new(model: Arc<FilterModel>, vcr: Arc<VcrTables>) -> Self {
        let mut integrator = Self {
            model,
            vcr,
            n_vddt_vw_2: 0,
            vx: 0,
            vc: 0,
        };
        integrator.set_vw(0);
        integrator
    }

    /// Set the normalized cutoff DAC output voltage
    pub fn set_vw(&mut self, n_vw: u16) {
        let d = i64::from(self.vcr.n_vddt) - i64::from(n_vw);
        self.n_vddt_vw_2 = (d * d) >> 1;
    }

    /// Advance one cycle, returning the output voltage code
    pub fn solve(&mut self, vi: i32) -> i32 {
        let vcr = &*self.vcr;
        let n_vddt = i64::from(vcr.n_vddt);
        let vi = i64::from(vi);

        let vgst = n_vddt - self.vx;
        let vgdt = n_vddt - vi;
        let vgst_2 = vgst * vgst;
        let vgdt_2 = vgdt * vgdt;

        // Snake current, scaled by m*2^30
        let n_i_snake = i64::from(vcr.n_snake) * ((vgst_2 - vgdt_2) >> 15);

        // VCR gate voltage
        let vg_index = ((self.n_vddt_vw_2 + (vgdt_2 >> 1)) >> 16).clamp(0, TABLE_SIZE as i64 - 1);
        let n_vg = i64::from(vcr.n_vg[vg_index as usize]);
        let k_vgt = n_vg - i64::from(vcr.n_vt);

        let vgs = (k_vgt - self.vx).clamp(0, TABLE_SIZE as i64 - 1);
        let vgd = (k_vgt - vi).clamp(0, TABLE_SIZE as i64 - 1);

        // VCR current, scaled by m*2^30
        let i_f = i64::from(vcr.n_ids_term[vgs as usize]) << 15;
        let i_r = i64::from(vcr.n_ids_term[vgd as usize]) << 15;

        self.vc += n_i_snake + (i_f - i_r);
        self.vx = i64::from(self.model.opamp_rev(opamp_rev_index(self.vc)));

        (self.vx - (self.vc >> 14)) as i32
    }

    /// Discharge the capacitor
    pub fn reset(&mut self) {
        self.vx = 0;
        self.vc = 0;
    }
}

/// 8580 integrator: switched-capacitor array modeled as one NMOS whose W/L
/// follows the cutoff register
#[derive(Debug, Clone)]
pub struct Integrator8580 {
    model: Arc<FilterModel>,
    tables: Arc<SwitchedCapTables>,
    n_dac: i64,
    vx: i64,
    vc: i64,
}

impl Integrator8580 {
    /// Integrator backed by a model's switched-capacitor constants
    pub fn new(model: Arc<FilterModel>, tables: Arc<SwitchedCapTables>) -> Self {
        let n_dac = i64::from(tables.n_dac(0));
        Self {
            model,
            tables,
            n_dac,
            vx: 0,
            vc: 0,
        }
    }

    /// Select the transistor array for a cutoff value
    pub fn set_fc(&mut self, fc: u16) {
        self.n_dac = i64::from(self.tables.n_dac(fc));
    }

    /// Advance one cycle, returning the output voltage code
    pub fn solve(&mut self, vi: i32) -> i32 {
        let n_vgt = i64::from(self.tables.n_vgt);
        let vi = i64::from(vi);

        let vgst = n_vgt - self.vx;
        let vgdt = (n_vgt - vi).max(0);
        let vgst_2 = vgst * vgst;
        let vgdt_2 = vgdt * vgdt;

        let n_i_dac = self.n_dac * ((vgst_2 - vgdt_2) >> 15);

        self.vc += n_i_dac;
        self.vx = i64::from(self.model.opamp_rev(opamp_rev_index(self.vc)));

        (self.vx - (self.vc >> 14)) as i32
    }

    /// Discharge the capacitor
    pub fn reset(&mut self) {
        self.vx = 0;
        self.vc = 0;
    }
}

/// Revision-specific integrator
#[derive(Debug, Clone)]
pub enum Integrator {
    /// 6581 VCR model
    Vcr(Integrator6581),
    /// 8580 switched capacitor model
    SwitchedCapacitor(Integrator8580),
}

impl Integrator {
    /// Apply an 11-bit cutoff value; `kinked` selects the 6581 ladder model
    pub fn set_cutoff(&mut self, fc: u16, kinked: bool) {
        match self {
            Integrator::Vcr(i) => {
                let n_vw = i.vcr.f0(fc, kinked);
                i.set_vw(n_vw);
            }
            Integrator::SwitchedCapacitor(i) => i.set_fc(fc),
        }
    }

    /// Advance one cycle
    #[inline]
    pub fn solve(&mut self, vi: i32) -> i32 {
        match self {
            Integrator::Vcr(i) => i.solve(vi),
            Integrator::SwitchedCapacitor(i) => i.solve(vi),
        }
    }

    /// Discharge the capacitor
    pub fn reset(&mut self) {
        match self {
            Integrator::Vcr(i) => i.reset(),
            Integrator::SwitchedCapacitor(i) => i.reset(),
        }
    }
}
