//! Backend trait abstraction for SID chip instances
//!
//! This module defines the public contract shared by the emulated chip and
//! hardware-backed chips. Both keep their chip-wide state in a [`ChipCore`];
//! the trait's provided methods run every access through the same access
//! clock and quirk engine, so only the final forwarding step differs.

use std::fmt;

use crate::config::EmulationConfig;
use crate::observer::{WriteEvent, WriteObserver};
use crate::scheduler::{EventClock, SchedulerHandle, SchedulerLease};
use crate::sid::quirks::{self, QuirkOutcome};
use crate::sid::{ChipRevision, QuirkState, Register, RegisterFile};

/// Value returned by reads on an unhealthy instance
pub const INVALID_READ: u8 = 0xff;

/// Chip-wide state common to every backend
pub struct ChipCore {
    revision: ChipRevision,
    registers: RegisterFile,
    quirks: QuirkState,
    defaults: QuirkState,
    access_clock: EventClock,
    lease: Option<SchedulerLease>,
    observer: Option<Box<dyn WriteObserver>>,
    status: bool,
    error: String,
}

impl ChipCore {
    /// Core configured from an emulation config
    pub fn new(config: &EmulationConfig) -> Self {
        let defaults = QuirkState::from(config);
        Self {
            revision: config.revision,
            registers: RegisterFile::new(),
            quirks: defaults,
            defaults,
            access_clock: 0,
            lease: None,
            observer: None,
            status: true,
            error: String::new(),
        }
    }

    /// Emulated revision
    pub fn revision(&self) -> ChipRevision {
        self.revision
    }

    /// Raw bytes as written by the host
    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Current quirk flags
    pub fn quirks(&self) -> &QuirkState {
        &self.quirks
    }

    /// Mutable quirk flags
    pub fn quirks_mut(&mut self) -> &mut QuirkState {
        &mut self.quirks
    }

    /// Scheduler time of the last access
    pub fn access_clock(&self) -> EventClock {
        self.access_clock
    }

    /// Whether a scheduler is held
    pub fn is_locked(&self) -> bool {
        self.lease.is_some()
    }

    /// Held scheduler lease
    pub fn lease(&self) -> Option<&SchedulerLease> {
        self.lease.as_ref()
    }

    /// Held scheduler lease, mutable
    pub fn lease_mut(&mut self) -> Option<&mut SchedulerLease> {
        self.lease.as_mut()
    }

    /// Install the side-channel observer
    pub fn set_observer(&mut self, observer: Box<dyn WriteObserver>) {
        self.observer = Some(observer);
    }

    /// Remove the side-channel observer
    pub fn take_observer(&mut self) -> Option<Box<dyn WriteObserver>> {
        self.observer.take()
    }

    /// Whether the instance is usable
    pub fn status(&self) -> bool {
        self.status
    }

    /// Last error message
    pub fn error(&self) -> &str {
        &self.error
    }

    /// Mark the instance unusable
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.status = false;
        self.error = message.into();
    }

    /// Take ownership of a scheduler; fails if one is already held
    pub fn lock(&mut self, scheduler: SchedulerHandle) -> bool {
        if self.lease.is_some() {
            return false;
        }
        self.lease = Some(SchedulerLease::new(scheduler));
        true
    }

    /// Release the scheduler; the lease cancels its pending event when dropped
    pub fn unlock(&mut self) -> Option<SchedulerLease> {
        self.lease.take()
    }

    /// Current scheduler time, if locked
    pub fn now(&self) -> Option<EventClock> {
        self.lease.as_ref().map(SchedulerLease::time)
    }

    /// Cycles since the previous access; advances the access clock
    ///
    /// Never negative, and the clock never moves backwards. Unlocked instances
    /// have no time source and report zero.
    pub fn elapsed(&mut self) -> EventClock {
        let Some(now) = self.now() else {
            return 0;
        };
        let cycles = now.saturating_sub(self.access_clock);
        self.access_clock = self.access_clock.max(now);
        cycles
    }

    /// Advance the access clock by cycles already accounted for
    pub fn advance_clock(&mut self, cycles: EventClock) {
        self.access_clock = self.access_clock.saturating_add(cycles);
    }

    /// Restart the access clock at zero
    pub fn reset_clock(&mut self) {
        self.access_clock = 0;
    }

    /// Forget written bytes and restore the construction-time quirk flags
    pub fn reset_state(&mut self) {
        self.registers.clear();
        self.quirks = self.defaults;
    }

    /// Remember a raw byte for reads
    pub fn record(&mut self, addr: u8, raw: u8) {
        self.registers.write(addr, raw);
    }

    /// Record the raw byte and run it through the quirk engine
    pub fn intercept(&mut self, addr: u8, raw: u8) -> QuirkOutcome {
        self.record(addr, raw);
        quirks::apply(addr, raw, &mut self.quirks, self.revision)
    }

    /// Publish a completed write on the side channel
    pub fn publish(&mut self, addr: u8, raw: u8, outcome: QuirkOutcome) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_write(&WriteEvent {
                addr,
                raw,
                corrected: outcome.corrected,
                env_disable: self.quirks.env_disable(),
                kinks_disabled: self.quirks.is_kinks_disabled(),
                trigger_waves: outcome.trigger_waves,
                trigger_filter: self.quirks.is_trigger_filter_enabled(),
            });
        }
    }
}

impl fmt::Debug for ChipCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChipCore")
            .field("revision", &self.revision)
            .field("quirks", &self.quirks)
            .field("access_clock", &self.access_clock)
            .field("locked", &self.lease.is_some())
            .field("status", &self.status)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Common interface for SID chip instances
///
/// This trait allows the emulated chip and hardware-backed chips to be used
/// interchangeably by the host.
///
/// # Example
///
/// ```
/// use sidemu::SidBackend;
///
/// fn mute_digis<B: SidBackend>(chip: &mut B) {
///     chip.set_voice_mute(3, true);
///     chip.write(0x18, 0x10); // forwarded as 0x1F
/// }
/// ```
pub trait SidBackend: Send {
    /// Shared chip state
    fn core(&self) -> &ChipCore;

    /// Shared chip state, mutable
    fn core_mut(&mut self) -> &mut ChipCore;

    /// Forward a corrected byte to the chip
    ///
    /// # Arguments
    ///
    /// * `cycles` - Cycles elapsed since the previous access
    /// * `addr` - Register address (0x00-0x1F)
    /// * `data` - Byte after quirk correction
    fn write_corrected(&mut self, cycles: EventClock, addr: u8, data: u8);

    /// Read a register from the chip itself
    ///
    /// Only called for the read-only registers (0x19-0x1C).
    ///
    /// # Arguments
    ///
    /// * `cycles` - Cycles elapsed since the previous access
    /// * `addr` - Register address (0x00-0x1F)
    ///
    /// # Returns
    ///
    /// Value reported by the chip
    fn read_chip(&mut self, cycles: EventClock, addr: u8) -> u8;

    /// Let cycles pass on the chip without an access
    ///
    /// # Arguments
    ///
    /// * `cycles` - Cycles elapsed since the previous access
    fn idle(&mut self, cycles: EventClock);

    /// Reset the chip
    ///
    /// Clears the register file, restarts the access clock and restores the
    /// quirk flags the instance was built with. A held scheduler stays held.
    ///
    /// # Arguments
    ///
    /// * `volume` - Value of the mode/volume register after reset
    fn reset(&mut self, volume: u8);

    /// Take exclusive ownership of a scheduler
    ///
    /// # Arguments
    ///
    /// * `scheduler` - Scheduler providing time and keep-alive events
    ///
    /// # Returns
    ///
    /// `true` on success. `false` without side effects if the instance is
    /// already locked, unusable, or the device refuses.
    fn lock(&mut self, scheduler: SchedulerHandle) -> bool;

    /// Release the scheduler
    ///
    /// Cancels the pending event, if any. Does nothing when unlocked.
    fn unlock(&mut self);

    /// Hook for filter enable changes
    fn apply_filter(&mut self, _enable: bool) {}

    /// Hook for kinked DAC changes
    fn apply_kinks(&mut self, _enable: bool) {}

    /// Write a register through the quirk engine
    ///
    /// The raw byte is kept for reads; the corrected byte goes to the chip.
    ///
    /// # Arguments
    ///
    /// * `addr` - Register address, masked to 0x00-0x1F
    /// * `data` - Byte as written by the host
    ///
    /// Unusable instances ignore writes.
    fn write(&mut self, addr: u8, data: u8) {
        if !self.core().status() {
            return;
        }
        let addr = addr & 0x1f;
        let cycles = self.core_mut().elapsed();
        let outcome = self.core_mut().intercept(addr, data);
        self.write_corrected(cycles, addr, outcome.corrected);
        self.core_mut().publish(addr, data, outcome);
    }

    /// Read a register
    ///
    /// # Arguments
    ///
    /// * `addr` - Register address, masked to 0x00-0x1F
    ///
    /// # Returns
    ///
    /// The raw byte last written for writable registers (quirks never show
    /// through reads), the chip's value for read-only registers, or
    /// [`INVALID_READ`] on an unusable instance
    fn read(&mut self, addr: u8) -> u8 {
        if !self.core().status() {
            return INVALID_READ;
        }
        let addr = addr & 0x1f;
        let cycles = self.core_mut().elapsed();
        if Register::from_addr(addr).is_read_only() {
            self.read_chip(cycles, addr)
        } else {
            self.idle(cycles);
            self.core().registers().read(addr)
        }
    }

    /// Whether a scheduler is held
    fn is_locked(&self) -> bool {
        self.core().is_locked()
    }

    /// Scheduler time of the last access
    fn access_clock(&self) -> EventClock {
        self.core().access_clock()
    }

    /// Whether the instance is usable
    ///
    /// # Returns
    ///
    /// `false` after a capacity error; see [`SidBackend::error`]
    fn status(&self) -> bool {
        self.core().status()
    }

    /// Last error message
    fn error(&self) -> &str {
        self.core().error()
    }

    /// Mute or unmute a voice
    ///
    /// # Arguments
    ///
    /// * `voice` - Voice index (0-2), or 3 for volume-register digis
    /// * `mute` - true to mute
    ///
    /// Other indices are ignored. Takes effect on the next write.
    fn set_voice_mute(&mut self, voice: usize, mute: bool) {
        self.core_mut().quirks_mut().set_voice_mute(voice, mute);
    }

    /// Enable or bypass the filter
    ///
    /// # Arguments
    ///
    /// * `enable` - false rewrites resonance/routing writes to 0x00
    fn set_filter(&mut self, enable: bool) {
        self.core_mut().quirks_mut().set_filter(enable);
        self.apply_filter(enable);
    }

    /// Allow or block filter routing of one voice
    ///
    /// # Arguments
    ///
    /// * `voice` - Voice index (0-2); other indices are ignored
    /// * `filtered` - false clears the voice's routing bit on writes
    fn set_voice_filter(&mut self, voice: usize, filtered: bool) {
        self.core_mut().quirks_mut().set_voice_filter(voice, filtered);
    }

    /// Enable or disable envelopes
    fn set_envelope(&mut self, enable: bool) {
        self.core_mut().quirks_mut().set_envelope(enable);
    }

    /// Enable or disable the kinked cutoff DAC
    fn set_kinks(&mut self, enable: bool) {
        self.core_mut().quirks_mut().set_kinks(enable);
        self.apply_kinks(enable);
    }

    /// Enable or disable trigger-filter emulation
    fn set_trigger_filter(&mut self, enable: bool) {
        self.core_mut().quirks_mut().set_trigger_filter(enable);
    }

    /// Trigger-waveform emulation for all voices
    ///
    /// # Arguments
    ///
    /// * `enable` - true to resolve combined waveforms on every voice
    fn set_trigger_waves(&mut self, enable: bool) {
        self.core_mut().quirks_mut().set_trigger_waves(enable);
    }

    /// Trigger-waveform emulation for one voice
    ///
    /// # Arguments
    ///
    /// * `voice` - Voice index (0-2); other indices are ignored
    /// * `enable` - true to resolve combined waveforms on this voice
    fn set_voice_trigger_waves(&mut self, voice: usize, enable: bool) {
        self.core_mut()
            .quirks_mut()
            .set_voice_trigger_waves(voice, enable);
    }

    /// Install the side-channel observer
    ///
    /// Replaces any previous observer.
    fn set_observer(&mut self, observer: Box<dyn WriteObserver>) {
        self.core_mut().set_observer(observer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_elapsed_follows_scheduler() {
        let sched = Arc::new(Mutex::new(ManualScheduler::new()));
        let mut core = ChipCore::new(&EmulationConfig::default());
        assert_eq!(core.elapsed(), 0);

        assert!(core.lock(sched.clone()));
        sched.lock().set_time(100);
        assert_eq!(core.elapsed(), 100);
        assert_eq!(core.access_clock(), 100);
        assert_eq!(core.elapsed(), 0);

        // Time going backwards never yields a negative delay
        sched.lock().set_time(40);
        assert_eq!(core.elapsed(), 0);
        assert_eq!(core.access_clock(), 100);
    }

    #[test]
    fn test_core_lock_is_exclusive() {
        let first: SchedulerHandle = Arc::new(Mutex::new(ManualScheduler::new()));
        let second: SchedulerHandle = Arc::new(Mutex::new(ManualScheduler::new()));
        let mut core = ChipCore::new(&EmulationConfig::default());

        assert!(core.lock(first.clone()));
        assert!(!core.lock(second));
        assert!(core.lease().is_some_and(|l| l.is_bound_to(&first)));
        assert!(core.unlock().is_some());
        assert!(core.unlock().is_none());
    }

    #[test]
    fn test_reset_state_restores_defaults() {
        let mut config = EmulationConfig::default();
        config.muted[2] = true;
        let mut core = ChipCore::new(&config);
        core.quirks_mut().set_voice_mute(2, false);
        core.quirks_mut().set_filter(false);
        core.intercept(0x05, 0x11);

        core.reset_state();
        assert!(core.quirks().is_voice_muted(2));
        assert!(!core.quirks().is_filter_disabled());
        assert_eq!(core.registers().read(0x05), 0);
    }

    #[test]
    fn test_set_error_marks_unhealthy() {
        let mut core = ChipCore::new(&EmulationConfig::default());
        core.set_error("no device");
        assert!(!core.status());
        assert_eq!(core.error(), "no device");
    }
}
