//! Emulation frontend
//!
//! `SidEmu` is the single entry point for register access on an emulated
//! chip. Each access first catches the pipeline up to the scheduler's time,
//! then runs the byte through the quirk engine.

use super::pipeline::SidPipeline;
use super::registers::Register;
use super::revision::ChipRevision;
use crate::backend::{ChipCore, SidBackend};
use crate::config::EmulationConfig;
use crate::scheduler::{EventClock, SchedulerHandle};

/// Emulated SID chip driving a pipeline
#[derive(Debug)]
pub struct SidEmu<P: SidPipeline> {
    core: ChipCore,
    pipeline: P,
}

impl<P: SidPipeline> SidEmu<P> {
    /// Emulated chip with default quirk flags
    pub fn new(revision: ChipRevision, pipeline: P) -> Self {
        Self::with_config(&EmulationConfig::for_revision(revision), pipeline)
    }

    /// Emulated chip with configured quirk flags
    pub fn with_config(config: &EmulationConfig, pipeline: P) -> Self {
        let mut emu = Self {
            core: ChipCore::new(config),
            pipeline,
        };
        emu.pipeline.enable_filter(config.filter);
        emu.pipeline.enable_kinks(config.kinks);
        emu
    }

    /// Downstream pipeline
    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Downstream pipeline, mutable
    pub fn pipeline_mut(&mut self) -> &mut P {
        &mut self.pipeline
    }

    /// Catch the pipeline up with the scheduler
    pub fn clock(&mut self) {
        let cycles = self.core.elapsed();
        self.idle(cycles);
    }

    /// Run the pipeline for cycles the scheduler does not know about
    pub fn clock_for(&mut self, cycles: EventClock) {
        self.pipeline.clock(cycles);
    }

    /// Release the pipeline
    pub fn into_pipeline(self) -> P {
        self.pipeline
    }
}

impl<P: SidPipeline> SidBackend for SidEmu<P> {
    fn core(&self) -> &ChipCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ChipCore {
        &mut self.core
    }

    fn write_corrected(&mut self, cycles: EventClock, addr: u8, data: u8) {
        self.pipeline.clock(cycles);
        self.pipeline.write(addr, data);
    }

    fn read_chip(&mut self, cycles: EventClock, addr: u8) -> u8 {
        self.pipeline.clock(cycles);
        self.pipeline.read(addr)
    }

    fn idle(&mut self, cycles: EventClock) {
        self.pipeline.clock(cycles);
    }

    fn reset(&mut self, volume: u8) {
        self.core.reset_clock();
        self.core.reset_state();
        self.pipeline.reset();

        let quirks = *self.core.quirks();
        self.pipeline.enable_filter(!quirks.is_filter_disabled());
        self.pipeline.enable_kinks(!quirks.is_kinks_disabled());

        let addr = Register::ModeVol.addr();
        self.core.record(addr, volume);
        self.pipeline.write(addr, volume);
    }

    fn lock(&mut self, scheduler: SchedulerHandle) -> bool {
        self.core.lock(scheduler)
    }

    fn unlock(&mut self) {
        self.core.unlock();
    }

    fn apply_filter(&mut self, enable: bool) {
        self.pipeline.enable_filter(enable);
    }

    fn apply_kinks(&mut self, enable: bool) {
        self.pipeline.enable_kinks(enable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Pipeline that records what reaches it
    #[derive(Debug, Default)]
    struct Recorder {
        writes: Vec<(u8, u8)>,
        clocked: u64,
        filter: Option<bool>,
        resets: usize,
    }

    impl SidPipeline for Recorder {
        fn write(&mut self, addr: u8, data: u8) {
            self.writes.push((addr, data));
        }

        fn read(&mut self, addr: u8) -> u8 {
            0x80 | addr
        }

        fn reset(&mut self) {
            self.resets += 1;
            self.writes.clear();
        }

        fn clock(&mut self, cycles: u64) {
            self.clocked += cycles;
        }

        fn enable_filter(&mut self, enable: bool) {
            self.filter = Some(enable);
        }
    }

    fn emu() -> SidEmu<Recorder> {
        SidEmu::new(ChipRevision::Mos8580, Recorder::default())
    }

    #[test]
    fn test_write_forwards_corrected_byte() {
        let mut sid = emu();
        sid.set_trigger_waves(true);
        sid.write(0x04, 0x41);
        assert_eq!(sid.pipeline().writes, vec![(0x04, 0x21)]);
        assert_eq!(sid.read(0x04), 0x41);
    }

    #[test]
    fn test_address_is_masked() {
        let mut sid = emu();
        sid.write(0x38, 0x0f);
        assert_eq!(sid.pipeline().writes, vec![(0x18, 0x0f)]);
    }

    #[test]
    fn test_read_only_registers_come_from_pipeline() {
        let mut sid = emu();
        assert_eq!(sid.read(0x1b), 0x9b);
        assert_eq!(sid.read(0x19), 0x99);
    }

    #[test]
    fn test_pipeline_catches_up_on_access() {
        let sched = Arc::new(Mutex::new(ManualScheduler::new()));
        let mut sid = emu();
        assert!(sid.lock(sched.clone()));

        sched.lock().set_time(250);
        sid.write(0x00, 0x12);
        assert_eq!(sid.pipeline().clocked, 250);

        sched.lock().set_time(300);
        sid.read(0x1c);
        assert_eq!(sid.pipeline().clocked, 300);
        assert_eq!(sid.access_clock(), 300);
    }

    #[test]
    fn test_filter_toggle_reaches_pipeline() {
        let mut sid = emu();
        assert_eq!(sid.pipeline().filter, Some(true));
        sid.set_filter(false);
        assert_eq!(sid.pipeline().filter, Some(false));
        sid.write(0x17, 0xf1);
        assert_eq!(sid.pipeline().writes, vec![(0x17, 0x00)]);
        assert_eq!(sid.read(0x17), 0xf1);
    }

    #[test]
    fn test_reset_writes_volume_and_restores_defaults() {
        let mut sid = emu();
        sid.set_voice_mute(0, true);
        sid.write(0x04, 0x11);
        sid.reset(0x0f);

        assert_eq!(sid.pipeline().resets, 1);
        assert_eq!(sid.pipeline().writes, vec![(0x18, 0x0f)]);
        assert_eq!(sid.read(0x04), 0x00);
        assert_eq!(sid.read(0x18), 0x0f);
        assert!(!sid.core().quirks().is_voice_muted(0));
        assert_eq!(sid.access_clock(), 0);
    }

    #[test]
    fn test_unlock_without_lock_is_noop() {
        let mut sid = emu();
        sid.unlock();
        assert!(!sid.is_locked());
        let sched: SchedulerHandle = Arc::new(Mutex::new(ManualScheduler::new()));
        assert!(sid.lock(sched.clone()));
        assert!(!sid.lock(sched));
        sid.unlock();
        sid.unlock();
        assert!(!sid.is_locked());
    }
}
