//! HardSID-backed chip instances
//!
//! Writes still pass through the quirk engine; the corrected byte goes to the
//! physical chip together with the number of cycles since the previous access.
//! While locked, a keep-alive event fires every [`HARDSID_DELAY_CYCLES`] and
//! flushes idle time to the device so its buffer never runs dry.

use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use super::driver::HardwareDriver;
use super::registry::{InstanceRegistry, InstanceSlot};
use crate::backend::{ChipCore, SidBackend};
use crate::config::EmulationConfig;
use crate::scheduler::{EventClock, EventId, SchedulerHandle};
use crate::sid::Register;

/// Keep-alive period in cycles
pub const HARDSID_DELAY_CYCLES: EventClock = 60000;

/// Longest delay a single driver call can express
const MAX_DRIVER_DELAY: EventClock = 0xffff;

const CREDITS: &str = concat!(
    "HardSID V",
    env!("CARGO_PKG_VERSION"),
    " Engine:\n",
    "\t(C) 1999-2002 Simon White\n"
);

/// One physical chip
#[derive(Debug)]
pub struct HardSid<D: HardwareDriver> {
    core: ChipCore,
    driver: Arc<Mutex<D>>,
    slot: InstanceSlot,
}

impl<D: HardwareDriver> HardSid<D> {
    fn new(driver: Arc<Mutex<D>>, slot: InstanceSlot, config: &EmulationConfig) -> Self {
        let mut sid = Self {
            core: ChipCore::new(config),
            driver,
            slot,
        };

        let devices = sid.driver.lock().devices();
        if sid.instance() >= devices {
            warn!(
                "hardware SID instance {} requested, only {devices} installed",
                sid.instance()
            );
            sid.core
                .set_error("HARDSID WARNING: System doesn't have enough SID chips.");
            return sid;
        }

        sid.reset(0);
        sid
    }

    /// Driver instance number
    pub fn instance(&self) -> usize {
        self.slot.index()
    }

    /// Engine credits
    pub fn credits() -> &'static str {
        CREDITS
    }

    /// Drop buffered accesses on the device
    pub fn flush(&mut self) {
        if self.core.status() {
            self.driver.lock().flush(self.instance());
        }
    }

    /// Pass whole 16-bit delays to the driver, returning the remainder
    fn drain(&mut self, mut cycles: EventClock) -> u16 {
        let instance = self.instance();
        let mut driver = self.driver.lock();
        while cycles > MAX_DRIVER_DELAY {
            driver.delay(instance, MAX_DRIVER_DELAY as u16);
            cycles -= MAX_DRIVER_DELAY;
        }
        cycles as u16
    }

    /// Keep-alive callback; call when the scheduler fires `event`
    ///
    /// Events not booked by this instance are ignored. If an access happened
    /// recently, the check is pushed back to a full period after it;
    /// otherwise the idle time is sent to the device.
    pub fn event(&mut self, event: EventId) {
        let access_clock = self.core.access_clock();
        let Some(lease) = self.core.lease_mut() else {
            return;
        };
        if !lease.acknowledge(event) {
            return;
        }

        let cycles = lease.time().saturating_sub(access_clock);
        if cycles < HARDSID_DELAY_CYCLES {
            lease.schedule(HARDSID_DELAY_CYCLES - cycles);
            return;
        }

        self.core.advance_clock(cycles);
        let rest = self.drain(cycles);
        if rest > 0 {
            self.driver.lock().delay(self.instance(), rest);
        }
        if let Some(lease) = self.core.lease_mut() {
            lease.schedule(HARDSID_DELAY_CYCLES);
        }
    }
}

impl<D: HardwareDriver> SidBackend for HardSid<D> {
    fn core(&self) -> &ChipCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ChipCore {
        &mut self.core
    }

    fn write_corrected(&mut self, cycles: EventClock, addr: u8, data: u8) {
        let rest = self.drain(cycles);
        self.driver.lock().write(self.instance(), rest, addr, data);
    }

    fn read_chip(&mut self, cycles: EventClock, addr: u8) -> u8 {
        let rest = self.drain(cycles);
        self.driver.lock().read(self.instance(), rest, addr)
    }

    fn idle(&mut self, cycles: EventClock) {
        let rest = self.drain(cycles);
        if rest > 0 {
            self.driver.lock().delay(self.instance(), rest);
        }
    }

    fn reset(&mut self, volume: u8) {
        if !self.core.status() {
            return;
        }
        self.core.reset_clock();
        self.core.reset_state();
        self.core.record(Register::ModeVol.addr(), volume);

        let instance = self.instance();
        let filter = !self.core.quirks().is_filter_disabled();
        {
            let mut driver = self.driver.lock();
            driver.flush(instance);
            if driver.supports_v204() {
                driver.reset2(instance, volume);
            } else {
                driver.reset(instance);
            }
            driver.sync(instance);
            driver.filter(instance, filter);
        }

        if let Some(lease) = self.core.lease_mut() {
            lease.schedule(HARDSID_DELAY_CYCLES);
        }
    }

    fn lock(&mut self, scheduler: SchedulerHandle) -> bool {
        if !self.core.status() || self.core.is_locked() {
            return false;
        }

        let instance = self.instance();
        {
            let mut driver = self.driver.lock();
            if driver.supports_v204() && !driver.lock(instance) {
                warn!("hardware SID instance {instance} refused by driver lock");
                return false;
            }
        }

        if !self.core.lock(scheduler) {
            return false;
        }
        if let Some(lease) = self.core.lease_mut() {
            lease.schedule(HARDSID_DELAY_CYCLES);
        }
        debug!("hardware SID instance {instance} locked");
        true
    }

    fn unlock(&mut self) {
        if !self.core.is_locked() {
            return;
        }
        let instance = self.instance();
        {
            let mut driver = self.driver.lock();
            if driver.supports_v204() {
                driver.unlock(instance);
            }
        }
        // Dropping the lease cancels the keep-alive
        drop(self.core.unlock());
        debug!("hardware SID instance {instance} unlocked");
    }

    fn apply_filter(&mut self, enable: bool) {
        if self.core.status() {
            self.driver.lock().filter(self.instance(), enable);
        }
    }
}

impl<D: HardwareDriver> Drop for HardSid<D> {
    fn drop(&mut self) {
        self.unlock();
    }
}

/// Factory for hardware-backed instances sharing one driver
#[derive(Debug)]
pub struct HardSidBuilder<D: HardwareDriver> {
    driver: Arc<Mutex<D>>,
    registry: InstanceRegistry,
    config: EmulationConfig,
}

impl<D: HardwareDriver> HardSidBuilder<D> {
    /// Builder around a loaded driver
    pub fn new(driver: D) -> Self {
        Self {
            driver: Arc::new(Mutex::new(driver)),
            registry: InstanceRegistry::new(),
            config: EmulationConfig::default(),
        }
    }

    /// Quirk defaults for created instances
    pub fn with_config(mut self, config: EmulationConfig) -> Self {
        self.config = config;
        self
    }

    /// Installed chips
    pub fn devices(&self) -> usize {
        self.driver.lock().devices()
    }

    /// Instances currently alive
    pub fn in_use(&self) -> usize {
        self.registry.in_use()
    }

    /// Create an instance on the lowest free slot
    ///
    /// Always succeeds; check [`SidBackend::status`] to see whether a chip
    /// backs it.
    pub fn create(&self) -> HardSid<D> {
        HardSid::new(Arc::clone(&self.driver), self.registry.acquire(), &self.config)
    }

    /// Shared driver
    pub fn driver(&self) -> &Arc<Mutex<D>> {
        &self.driver
    }

    /// Engine credits
    pub fn credits(&self) -> &'static str {
        HardSid::<D>::credits()
    }
}
