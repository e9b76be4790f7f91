//! Downstream generator/filter pipeline
//!
//! The frontend hands every quirk-corrected byte to a [`SidPipeline`]. The
//! waveform and envelope generators are outside this crate; the analog
//! pipeline here owns the filter and output stage and accepts voice levels
//! from whatever produces them.

#[cfg(feature = "emulator")]
use std::sync::Arc;

#[cfg(feature = "emulator")]
use super::{
    filter::Filter,
    model::FilterModel,
    registers::{Register, RegisterFile},
    revision::ChipRevision,
};
#[cfg(feature = "emulator")]
use crate::Result;

/// Receiver of corrected register writes
pub trait SidPipeline: Send {
    /// Apply a corrected register write
    fn write(&mut self, addr: u8, data: u8);

    /// Read a register as the chip sees it
    fn read(&mut self, addr: u8) -> u8;

    /// Return to power-on state
    fn reset(&mut self);

    /// Advance by a number of cycles
    fn clock(&mut self, cycles: u64);

    /// Enable or bypass the filter stage
    fn enable_filter(&mut self, _enable: bool) {}

    /// Enable or disable the non-linear cutoff DAC
    fn enable_kinks(&mut self, _enable: bool) {}
}

/// Register shadow plus the analog filter and output stage
#[cfg(feature = "emulator")]
#[derive(Debug, Clone)]
pub struct AnalogPipeline {
    revision: ChipRevision,
    registers: RegisterFile,
    filter: Filter,
    voices: [f32; 3],
    output: u16,
    cycles: u64,
}

#[cfg(feature = "emulator")]
impl AnalogPipeline {
    /// Pipeline on the shared model of a revision
    pub fn new(revision: ChipRevision) -> Result<Self> {
        Ok(Self::with_model(revision, FilterModel::shared(revision)?))
    }

    /// Pipeline on an explicit model
    pub fn with_model(revision: ChipRevision, model: Arc<FilterModel>) -> Self {
        let filter = Filter::new(model);
        let mut pipeline = Self {
            revision,
            registers: RegisterFile::new(),
            filter,
            voices: [0.0; 3],
            output: 0,
            cycles: 0,
        };
        pipeline.output = pipeline.filter.clock(0.0, 0.0, 0.0);
        pipeline
    }

    /// Revision this pipeline models
    pub fn revision(&self) -> ChipRevision {
        self.revision
    }

    /// Set the generator outputs feeding the filter, each in [-1, 1]
    pub fn set_voice_levels(&mut self, voices: [f32; 3]) {
        self.voices = voices;
    }

    /// Set the external audio input, in [-1, 1]
    pub fn set_external_input(&mut self, level: f32) {
        self.filter.set_external_input(level);
    }

    /// Last output code
    pub fn output_code(&self) -> u16 {
        self.output
    }

    /// Last output as a signed sample
    pub fn output(&self) -> i16 {
        (i32::from(self.output) - 0x8000) as i16
    }

    /// Corrected bytes as the chip received them
    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Filter stage
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Total cycles clocked since reset
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

#[cfg(feature = "emulator")]
impl SidPipeline for AnalogPipeline {
    fn write(&mut self, addr: u8, data: u8) {
        self.registers.write(addr, data);
        match Register::from_addr(addr) {
            Register::FcLo => self.filter.write_fc_lo(data),
            Register::FcHi => self.filter.write_fc_hi(data),
            Register::ResFilt => self.filter.write_res_filt(data),
            Register::ModeVol => self.filter.write_mode_vol(data),
            _ => {}
        }
    }

    fn read(&mut self, addr: u8) -> u8 {
        match Register::from_addr(addr) {
            // No paddles attached
            Register::PotX | Register::PotY => 0xff,
            // Voice 3 generators are not modeled here
            Register::Osc3 | Register::Env3 => 0x00,
            _ => self.registers.read(addr),
        }
    }

    fn reset(&mut self) {
        self.registers.clear();
        self.filter.reset();
        self.voices = [0.0; 3];
        self.cycles = 0;
        self.output = self.filter.clock(0.0, 0.0, 0.0);
    }

    fn clock(&mut self, cycles: u64) {
        let [v1, v2, v3] = self.voices;
        for _ in 0..cycles {
            self.output = self.filter.clock(v1, v2, v3);
        }
        self.cycles = self.cycles.wrapping_add(cycles);
    }

    fn enable_filter(&mut self, enable: bool) {
        self.filter.enable(enable);
    }

    fn enable_kinks(&mut self, enable: bool) {
        self.filter.set_kinked_dac(enable);
    }
}
