//! State-variable filter and output stage
//!
//! Per cycle the three voice levels (and the external input) are routed
//! either into the filter summer or straight into the output mixer. The
//! filter loop is
//!
//! ```text
//! Vhp = summer[res[Vbp] + Vlp + Vsum]
//! Vbp = hp_integrator(Vhp)
//! Vlp = bp_integrator(Vbp)
//! ```
//!
//! and the selected filter outputs join the mixer, whose result is scaled by
//! the master volume table.

use std::sync::Arc;

use super::integrator::Integrator;
use super::model::{FilterModel, MIXER_TABLES, SUMMER_TABLES};
use super::registers::{ModeFlags, RoutingFlags};

#[inline]
fn lookup(table: &[u16], index: i32) -> i32 {
    let last = table.len() as i32 - 1;
    i32::from(table[index.clamp(0, last) as usize])
}

/// One chip's filter and output stage
#[derive(Debug, Clone)]
pub struct Filter {
    model: Arc<FilterModel>,
    hp_integrator: Integrator,
    bp_integrator: Integrator,

    /// 11-bit cutoff
    fc: u16,
    /// 4-bit resonance
    res: u8,
    /// 4-bit master volume
    vol: u8,
    /// Routing as written
    routing: RoutingFlags,
    /// Routing in effect (cleared while disabled)
    filt: RoutingFlags,
    mode: ModeFlags,

    enabled: bool,
    kinked_dac: bool,

    ve: i32,
    vhp: i32,
    vbp: i32,
    vlp: i32,

    n_sum: usize,
    n_mix: usize,
}

impl Filter {
    /// Filter running on a shared model
    pub fn new(model: Arc<FilterModel>) -> Self {
        let hp_integrator = model.build_integrator();
        let bp_integrator = model.build_integrator();
        let ve = model.normalized_voice(0.0);
        let mut filter = Self {
            model,
            hp_integrator,
            bp_integrator,
            fc: 0,
            res: 0,
            vol: 0,
            routing: RoutingFlags::empty(),
            filt: RoutingFlags::empty(),
            mode: ModeFlags::empty(),
            enabled: true,
            kinked_dac: true,
            ve,
            vhp: 0,
            vbp: 0,
            vlp: 0,
            n_sum: 0,
            n_mix: 0,
        };
        filter.update_cutoff();
        filter.update_mixing();
        filter
    }

    /// Return to power-on state
    pub fn reset(&mut self) {
        self.fc = 0;
        self.res = 0;
        self.vol = 0;
        self.routing = RoutingFlags::empty();
        self.mode = ModeFlags::empty();
        self.vhp = 0;
        self.vbp = 0;
        self.vlp = 0;
        self.hp_integrator.reset();
        self.bp_integrator.reset();
        self.update_cutoff();
        self.update_routing();
    }

    /// Enable or bypass the filter; bypassing sends every voice to the mixer
    pub fn enable(&mut self, enable: bool) {
        self.enabled = enable;
        self.update_routing();
    }

    /// Whether the filter is in circuit
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Select the non-linear 6581 cutoff ladder (default) or an ideal one
    pub fn set_kinked_dac(&mut self, kinked: bool) {
        self.kinked_dac = kinked;
        self.update_cutoff();
    }

    /// Level of the external audio input, in [-1, 1]
    pub fn set_external_input(&mut self, level: f32) {
        self.ve = self.model.normalized_voice(level);
    }

    /// $15: cutoff bits 0-2
    pub fn write_fc_lo(&mut self, value: u8) {
        self.fc = (self.fc & 0x7f8) | u16::from(value & 0x07);
        self.update_cutoff();
    }

    /// $16: cutoff bits 3-10
    pub fn write_fc_hi(&mut self, value: u8) {
        self.fc = (u16::from(value) << 3) | (self.fc & 0x007);
        self.update_cutoff();
    }

    /// $17: resonance and routing
    pub fn write_res_filt(&mut self, value: u8) {
        self.res = value >> 4;
        self.routing = RoutingFlags::from_bits_truncate(value & 0x0f);
        self.update_routing();
    }

    /// $18: mode and master volume
    pub fn write_mode_vol(&mut self, value: u8) {
        self.vol = value & 0x0f;
        self.mode = ModeFlags::from_bits_truncate(value);
        self.update_mixing();
    }

    /// Current 11-bit cutoff
    pub fn fc(&self) -> u16 {
        self.fc
    }

    /// Current resonance
    pub fn res(&self) -> u8 {
        self.res
    }

    /// Current master volume
    pub fn volume(&self) -> u8 {
        self.vol
    }

    /// Routing currently in effect
    pub fn routing(&self) -> RoutingFlags {
        self.filt
    }

    /// Number of inputs feeding the summer and the mixer
    pub fn input_counts(&self) -> (usize, usize) {
        (self.n_sum, self.n_mix)
    }

    fn update_cutoff(&mut self) {
        self.hp_integrator.set_cutoff(self.fc, self.kinked_dac);
        self.bp_integrator.set_cutoff(self.fc, self.kinked_dac);
    }

    fn update_routing(&mut self) {
        self.filt = if self.enabled {
            self.routing
        } else {
            RoutingFlags::empty()
        };
        self.update_mixing();
    }

    fn update_mixing(&mut self) {
        let filt = self.filt;
        let voice3_off = self.mode.contains(ModeFlags::VOICE3_OFF);

        self.n_sum = filt.bits().count_ones() as usize;

        let unfiltered = [
            !filt.contains(RoutingFlags::FILT1),
            !filt.contains(RoutingFlags::FILT2),
            !filt.contains(RoutingFlags::FILT3) && !voice3_off,
            !filt.contains(RoutingFlags::FILT_EXT),
            self.mode.contains(ModeFlags::LP),
            self.mode.contains(ModeFlags::BP),
            self.mode.contains(ModeFlags::HP),
        ];
        self.n_mix = unfiltered.iter().filter(|&&on| on).count();

        debug_assert!(self.n_sum < SUMMER_TABLES);
        debug_assert!(self.n_mix < MIXER_TABLES);
    }

    /// Advance one cycle with the three voice levels in [-1, 1]
    ///
    /// Returns the output voltage code.
    pub fn clock(&mut self, voice1: f32, voice2: f32, voice3: f32) -> u16 {
        let v1 = self.model.normalized_voice(voice1);
        let v2 = self.model.normalized_voice(voice2);
        let v3 = self.model.normalized_voice(voice3);

        let filt = self.filt;
        let mut vsum = 0;
        let mut vmix = 0;

        if filt.contains(RoutingFlags::FILT1) {
            vsum += v1;
        } else {
            vmix += v1;
        }
        if filt.contains(RoutingFlags::FILT2) {
            vsum += v2;
        } else {
            vmix += v2;
        }
        // Voice 3 is only disconnected from the direct path
        if filt.contains(RoutingFlags::FILT3) {
            vsum += v3;
        } else if !self.mode.contains(ModeFlags::VOICE3_OFF) {
            vmix += v3;
        }
        if filt.contains(RoutingFlags::FILT_EXT) {
            vsum += self.ve;
        } else {
            vmix += self.ve;
        }

        let resonance = self.model.resonance(usize::from(self.res));
        let summer = self.model.summer(self.n_sum);
        self.vhp = lookup(summer, lookup(resonance, self.vbp) + self.vlp + vsum);
        self.vbp = self.hp_integrator.solve(self.vhp);
        self.vlp = self.bp_integrator.solve(self.vbp);

        if self.mode.contains(ModeFlags::LP) {
            vmix += self.vlp;
        }
        if self.mode.contains(ModeFlags::BP) {
            vmix += self.vbp;
        }
        if self.mode.contains(ModeFlags::HP) {
            vmix += self.vhp;
        }

        let mixed = lookup(self.model.mixer(self.n_mix), vmix);
        lookup(self.model.volume(usize::from(self.vol)), mixed) as u16
    }
}
