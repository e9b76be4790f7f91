//! Register write side channel
//!
//! Every intercepted write is published to an optional observer after it has
//! been forwarded downstream. Observers see both the byte the host wrote and
//! the byte the chip received, plus the quirk flags in force, which is what
//! visualizers and register mirrors need. Observers cannot alter chip state.

/// One intercepted register write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteEvent {
    /// Register address (0x00-0x1F)
    pub addr: u8,
    /// Byte written by the host
    pub raw: u8,
    /// Byte forwarded to the generators after quirk correction
    pub corrected: u8,
    /// Envelope-disable bookkeeping after this write
    pub env_disable: bool,
    /// Cutoff DAC kinks disabled
    pub kinks_disabled: bool,
    /// Trigger-waveform emulation active for the written voice (any voice for
    /// non-voice registers)
    pub trigger_waves: bool,
    /// Trigger-filter emulation enabled
    pub trigger_filter: bool,
}

impl WriteEvent {
    /// Whether the quirk engine changed the byte
    pub fn was_rewritten(&self) -> bool {
        self.raw != self.corrected
    }
}

/// Receiver for intercepted writes
pub trait WriteObserver: Send {
    /// Called once per register write, after the corrected byte was applied
    fn on_write(&mut self, event: &WriteEvent);
}

/// Collects events in memory
#[derive(Debug, Default, Clone)]
pub struct WriteLog {
    events: Vec<WriteEvent>,
}

impl WriteLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, oldest first
    pub fn events(&self) -> &[WriteEvent] {
        &self.events
    }

    /// Drop all recorded events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl WriteObserver for WriteLog {
    fn on_write(&mut self, event: &WriteEvent) {
        self.events.push(*event);
    }
}

impl<T: WriteObserver + ?Sized> WriteObserver for std::sync::Arc<parking_lot::Mutex<T>> {
    fn on_write(&mut self, event: &WriteEvent) {
        self.lock().on_write(event);
    }
}
