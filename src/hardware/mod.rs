//! Hardware-backed SID instances
//!
//! Same public contract as the emulated chip, but corrected bytes are sent
//! to physical chips through a [`HardwareDriver`].

pub mod driver;
pub mod hardsid;
pub mod registry;

pub use driver::{HardwareDriver, HSID_VERSION_204};
pub use hardsid::{HardSid, HardSidBuilder, HARDSID_DELAY_CYCLES};
pub use registry::{InstanceRegistry, InstanceSlot};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{ManualScheduler, SchedulerHandle};
    use crate::SidBackend;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Write(usize, u16, u8, u8),
        Read(usize, u16, u8),
        Delay(usize, u16),
        Reset(usize),
        Reset2(usize, u8),
        Lock(usize),
        Unlock(usize),
        Flush(usize),
        Sync(usize),
        Filter(usize, bool),
    }

    #[derive(Debug)]
    struct MockDriver {
        devices: usize,
        version: u16,
        refuse_lock: bool,
        calls: Vec<Call>,
    }

    impl MockDriver {
        fn new(devices: usize, version: u16) -> Self {
            Self {
                devices,
                version,
                refuse_lock: false,
                calls: Vec::new(),
            }
        }
    }

    impl HardwareDriver for MockDriver {
        fn devices(&self) -> usize {
            self.devices
        }
        fn version(&self) -> u16 {
            self.version
        }
        fn write(&mut self, instance: usize, cycles: u16, addr: u8, data: u8) {
            self.calls.push(Call::Write(instance, cycles, addr, data));
        }
        fn read(&mut self, instance: usize, cycles: u16, addr: u8) -> u8 {
            self.calls.push(Call::Read(instance, cycles, addr));
            0x42
        }
        fn delay(&mut self, instance: usize, cycles: u16) {
            self.calls.push(Call::Delay(instance, cycles));
        }
        fn reset(&mut self, instance: usize) {
            self.calls.push(Call::Reset(instance));
        }
        fn reset2(&mut self, instance: usize, volume: u8) {
            self.calls.push(Call::Reset2(instance, volume));
        }
        fn lock(&mut self, instance: usize) -> bool {
            self.calls.push(Call::Lock(instance));
            !self.refuse_lock
        }
        fn unlock(&mut self, instance: usize) {
            self.calls.push(Call::Unlock(instance));
        }
        fn flush(&mut self, instance: usize) {
            self.calls.push(Call::Flush(instance));
        }
        fn sync(&mut self, instance: usize) {
            self.calls.push(Call::Sync(instance));
        }
        fn filter(&mut self, instance: usize, enable: bool) {
            self.calls.push(Call::Filter(instance, enable));
        }
    }

    fn calls(builder: &HardSidBuilder<MockDriver>) -> Vec<Call> {
        std::mem::take(&mut builder.driver().lock().calls)
    }

    #[test]
    fn test_construction_resets_device() {
        let builder = HardSidBuilder::new(MockDriver::new(1, 0x0204));
        let sid = builder.create();
        assert!(sid.status());
        assert_eq!(
            calls(&builder),
            vec![
                Call::Flush(0),
                Call::Reset2(0, 0),
                Call::Sync(0),
                Call::Filter(0, true)
            ]
        );
    }

    #[test]
    fn test_old_driver_uses_plain_reset_and_no_lock() {
        let builder = HardSidBuilder::new(MockDriver::new(1, 0x0203));
        let mut sid = builder.create();
        calls(&builder);

        sid.reset(0x0f);
        assert!(calls(&builder).contains(&Call::Reset(0)));

        let sched: SchedulerHandle = Arc::new(Mutex::new(ManualScheduler::new()));
        assert!(sid.lock(sched));
        sid.unlock();
        assert!(calls(&builder).is_empty());
    }

    #[test]
    fn test_capacity_error_makes_instance_inert() {
        let builder = HardSidBuilder::new(MockDriver::new(1, 0x0204));
        let _first = builder.create();
        let mut second = builder.create();
        calls(&builder);

        assert!(!second.status());
        assert!(second.error().contains("enough SID chips"));
        second.write(0x04, 0x41);
        assert_eq!(second.read(0x1b), 0xff);
        assert_eq!(second.read(0x04), 0xff);
        second.reset(0x0f);
        let sched: SchedulerHandle = Arc::new(Mutex::new(ManualScheduler::new()));
        assert!(!second.lock(sched));
        assert!(calls(&builder).is_empty());
    }

    #[test]
    fn test_dropping_instance_frees_slot() {
        let builder = HardSidBuilder::new(MockDriver::new(2, 0x0204));
        let a = builder.create();
        let b = builder.create();
        assert_eq!((a.instance(), b.instance()), (0, 1));
        drop(a);
        assert_eq!(builder.in_use(), 1);
        assert_eq!(builder.create().instance(), 0);
    }

    #[test]
    fn test_write_passes_quirked_byte_and_delay() {
        let sched = Arc::new(Mutex::new(ManualScheduler::new()));
        let builder = HardSidBuilder::new(MockDriver::new(1, 0x0204));
        let mut sid = builder.create();
        assert!(sid.lock(sched.clone()));
        sid.set_voice_mute(0, true);
        calls(&builder);

        sched.lock().set_time(0x1_0010);
        sid.write(0x04, 0x41);
        assert_eq!(
            calls(&builder),
            vec![Call::Delay(0, 0xffff), Call::Write(0, 0x11, 0x04, 0x40)]
        );
        assert_eq!(sid.access_clock(), 0x1_0010);

        sched.lock().set_time(0x1_0020);
        assert_eq!(sid.read(0x1b), 0x42);
        assert_eq!(calls(&builder), vec![Call::Read(0, 0x10, 0x1b)]);
    }

    #[test]
    fn test_lock_refused_by_driver_has_no_side_effects() {
        let mut driver = MockDriver::new(1, 0x0204);
        driver.refuse_lock = true;
        let builder = HardSidBuilder::new(driver);
        let mut sid = builder.create();

        let sched = Arc::new(Mutex::new(ManualScheduler::new()));
        assert!(!sid.lock(sched.clone()));
        assert!(!sid.is_locked());
        assert_eq!(sched.lock().pending_count(), 0);

        // Unlock after a failed lock does nothing
        calls(&builder);
        sid.unlock();
        assert!(calls(&builder).is_empty());
    }

    #[test]
    fn test_lock_schedules_keepalive_and_unlock_cancels() {
        let sched = Arc::new(Mutex::new(ManualScheduler::new()));
        let builder = HardSidBuilder::new(MockDriver::new(1, 0x0204));
        let mut sid = builder.create();
        calls(&builder);

        assert!(sid.lock(sched.clone()));
        assert!(!sid.lock(sched.clone()));
        assert_eq!(calls(&builder), vec![Call::Lock(0)]);
        assert_eq!(sched.lock().pending_count(), 1);

        sid.unlock();
        assert_eq!(calls(&builder), vec![Call::Unlock(0)]);
        assert_eq!(sched.lock().pending_count(), 0);
    }

    #[test]
    fn test_keepalive_flushes_idle_time() {
        let sched = Arc::new(Mutex::new(ManualScheduler::new()));
        let builder = HardSidBuilder::new(MockDriver::new(1, 0x0204));
        let mut sid = builder.create();
        assert!(sid.lock(sched.clone()));
        calls(&builder);

        // Idle period: the whole gap goes to the device
        let fired = sched.lock().advance(HARDSID_DELAY_CYCLES);
        assert_eq!(fired.len(), 1);
        sid.event(fired[0]);
        assert_eq!(calls(&builder), vec![Call::Delay(0, 60000)]);
        assert_eq!(sid.access_clock(), HARDSID_DELAY_CYCLES);

        // Recent access: the check is pushed back instead
        sched.lock().advance(10_000);
        sid.write(0x18, 0x0f);
        calls(&builder);
        let fired = sched.lock().advance(50_000);
        assert_eq!(fired.len(), 1);
        sid.event(fired[0]);
        assert!(calls(&builder).is_empty());
        assert_eq!(sched.lock().advance(9_999).len(), 0);
        assert_eq!(sched.lock().advance(1).len(), 1);
    }

    #[test]
    fn test_foreign_event_ignored() {
        let sched = Arc::new(Mutex::new(ManualScheduler::new()));
        let builder = HardSidBuilder::new(MockDriver::new(1, 0x0204));
        let mut sid = builder.create();
        assert!(sid.lock(sched.clone()));
        calls(&builder);
        sid.event(crate::scheduler::EventId(9999));
        assert!(calls(&builder).is_empty());
    }

    #[test]
    fn test_filter_passthrough_and_credits() {
        let builder = HardSidBuilder::new(MockDriver::new(1, 0x0204));
        let mut sid = builder.create();
        calls(&builder);
        sid.set_filter(false);
        assert_eq!(calls(&builder), vec![Call::Filter(0, false)]);
        sid.flush();
        assert_eq!(calls(&builder), vec![Call::Flush(0)]);
        assert!(builder.credits().starts_with("HardSID V"));
    }
}
