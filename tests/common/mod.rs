//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use sidemu::observer::WriteLog;
use sidemu::scheduler::ManualScheduler;
use sidemu::{ChipRevision, SidBackend, SidEmu, SidPipeline};

/// Pipeline that records the corrected bytes it receives
#[derive(Debug, Default)]
pub struct RecordingPipeline {
    pub writes: Vec<(u8, u8)>,
    pub clocked: u64,
}

impl SidPipeline for RecordingPipeline {
    fn write(&mut self, addr: u8, data: u8) {
        self.writes.push((addr, data));
    }

    fn read(&mut self, _addr: u8) -> u8 {
        0x00
    }

    fn reset(&mut self) {
        self.writes.clear();
        self.clocked = 0;
    }

    fn clock(&mut self, cycles: u64) {
        self.clocked += cycles;
    }
}

pub fn scheduler() -> Arc<Mutex<ManualScheduler>> {
    Arc::new(Mutex::new(ManualScheduler::new()))
}

pub fn recording_chip(revision: ChipRevision) -> SidEmu<RecordingPipeline> {
    SidEmu::new(revision, RecordingPipeline::default())
}

/// Attach a write log and return a handle to it
pub fn observe<B: SidBackend>(chip: &mut B) -> Arc<Mutex<WriteLog>> {
    let log = Arc::new(Mutex::new(WriteLog::new()));
    chip.set_observer(Box::new(Arc::clone(&log)));
    log
}

/// Byte the chip received for the last write
pub fn last_corrected(log: &Arc<Mutex<WriteLog>>) -> u8 {
    log.lock()
        .events()
        .last()
        .map(|e| e.corrected)
        .expect("no write recorded")
}
